// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single path from a monitor's measurement to the transport.

use crate::error::EmitError;
use crate::registry::Registry;
use crate::sample::{Fields, MonitorId, SampleRecord, SampleValue};
use crate::transport::Transport;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Default)]
struct EmitCounters {
    emitted: AtomicU64,
    rejected: AtomicU64,
    transport_failures: AtomicU64,
}

/// Point-in-time copy of an emitter's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmitCounts {
    pub emitted: u64,
    /// Emissions of metrics the module never registered.
    pub rejected: u64,
    pub transport_failures: u64,
}

impl EmitCounts {
    /// Counts accumulated since `earlier`.
    pub fn since(&self, earlier: &EmitCounts) -> EmitCounts {
        EmitCounts {
            emitted: self.emitted.saturating_sub(earlier.emitted),
            rejected: self.rejected.saturating_sub(earlier.rejected),
            transport_failures: self
                .transport_failures
                .saturating_sub(earlier.transport_failures),
        }
    }
}

/// Emits samples on behalf of one monitor instance.
///
/// Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct SampleEmitter {
    identity: MonitorId,
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    counters: Arc<EmitCounters>,
}

impl fmt::Debug for SampleEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleEmitter")
            .field("identity", &self.identity)
            .field("counts", &self.counts())
            .finish()
    }
}

impl SampleEmitter {
    pub fn new(identity: MonitorId, registry: Arc<Registry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            identity,
            registry,
            transport,
            counters: Arc::new(EmitCounters::default()),
        }
    }

    pub fn identity(&self) -> &MonitorId {
        &self.identity
    }

    /// Reports one value. Failures are logged and counted, never returned, so
    /// a bad emission cannot abort the rest of a sample.
    pub fn emit_value(
        &self,
        metric: &str,
        value: impl Into<SampleValue>,
        extra_fields: Option<Fields>,
    ) {
        match self.try_emit(metric, value, extra_fields) {
            Ok(()) => {}
            Err(EmitError::Unregistered { .. }) => {
                error!(
                    monitor = %self.identity,
                    "Registry violation: metric '{metric}' is not registered for {}. This is a bug in the monitor; the value was dropped.",
                    self.identity.module()
                );
            }
            Err(EmitError::Transport(e)) => {
                warn!(monitor = %self.identity, "Failed to submit '{metric}': {e}");
            }
        }
    }

    /// Like [`SampleEmitter::emit_value`] but returns the failure to the caller.
    /// Counters are updated either way.
    pub fn try_emit(
        &self,
        metric: &str,
        value: impl Into<SampleValue>,
        extra_fields: Option<Fields>,
    ) -> Result<(), EmitError> {
        let call_site = extra_fields.unwrap_or_default();
        let Some(mut fields) = self
            .registry
            .resolve_fields(self.identity.module(), metric, &call_site)
        else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(EmitError::Unregistered {
                module: self.identity.module().to_string(),
                metric: metric.to_string(),
            });
        };

        fields.extend(call_site);

        let record = SampleRecord {
            monitor: self.identity.clone(),
            metric: metric.to_string(),
            value: value.into(),
            timestamp: Utc::now(),
            fields,
        };

        match self.transport.submit(record) {
            Ok(()) => {
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.counters
                    .transport_failures
                    .fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    pub fn counts(&self) -> EmitCounts {
        EmitCounts {
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            transport_failures: self.counters.transport_failures.load(Ordering::Relaxed),
        }
    }
}
