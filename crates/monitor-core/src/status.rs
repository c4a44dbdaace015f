// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Read-only health view over all runtimes.

use crate::emitter::EmitCounts;
use crate::runtime::{RunPhase, RunState};
use crate::sample::MonitorId;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub id: String,
    pub module: String,
    pub state: RunPhase,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub samples_completed: u64,
    pub last_sample_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub emitted: u64,
    pub rejected_emissions: u64,
    pub transport_failures: u64,
}

impl MonitorStatus {
    pub fn new(id: &MonitorId, state: RunState, counts: EmitCounts) -> Self {
        Self {
            id: id.to_string(),
            module: id.module().to_string(),
            state: state.phase,
            consecutive_failures: state.consecutive_failures,
            total_failures: state.total_failures,
            samples_completed: state.samples_completed,
            last_sample_at: state.last_sample_at,
            last_success_at: state.last_success_at,
            last_error: state.last_error,
            emitted: counts.emitted,
            rejected_emissions: counts.rejected,
            transport_failures: counts.transport_failures,
        }
    }

    fn is_unhealthy(&self, unhealthy_after: u32) -> bool {
        self.state == RunPhase::Failed
            || (unhealthy_after > 0 && self.consecutive_failures >= unhealthy_after)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub unhealthy_after: u32,
    pub monitors: Vec<MonitorStatus>,
}

impl StatusReport {
    pub fn new(monitors: Vec<MonitorStatus>, unhealthy_after: u32) -> Self {
        Self {
            generated_at: Utc::now(),
            unhealthy_after,
            monitors,
        }
    }

    /// No instance failed outright, and none is past the consecutive failure
    /// threshold. A threshold of zero disables the second check.
    pub fn is_healthy(&self) -> bool {
        !self
            .monitors
            .iter()
            .any(|m| m.is_unhealthy(self.unhealthy_after))
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &MonitorStatus> {
        self.monitors
            .iter()
            .filter(|m| m.is_unhealthy(self.unhealthy_after))
    }

    pub fn failed(&self) -> impl Iterator<Item = &MonitorStatus> {
        self.monitors.iter().filter(|m| m.state == RunPhase::Failed)
    }

    pub fn count_in(&self, phase: RunPhase) -> usize {
        self.monitors.iter().filter(|m| m.state == phase).count()
    }

    pub fn get(&self, id: &str) -> Option<&MonitorStatus> {
        self.monitors.iter().find(|m| m.id == id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
