// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Owns every runtime: creates them from configuration, starts them together
//! and stops them within a bound.

use crate::error::ManagerError;
use crate::monitor::{MonitorCatalog, MonitorKind};
use crate::options::RawMonitorConfig;
use crate::platform::Platform;
use crate::registry::Registry;
use crate::runtime::{MonitorRuntime, RunPhase, RuntimeDeps, RuntimeHandle};
use crate::sample::MonitorId;
use crate::status::StatusReport;
use crate::transport::Transport;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_UNHEALTHY_AFTER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Used by instances that do not set `sample_interval`.
    pub default_sample_interval: Duration,
    /// Consecutive failures after which an instance counts as unhealthy.
    pub unhealthy_after: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_sample_interval: DEFAULT_SAMPLE_INTERVAL,
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
        }
    }
}

/// Outcome of [`MonitorManager::start_all`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StartReport {
    pub started: Vec<MonitorId>,
    pub failed: Vec<(MonitorId, String)>,
}

/// Outcome of [`MonitorManager::stop_all`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StopReport {
    pub stopped: Vec<MonitorId>,
    /// Still finishing a sample when the timeout elapsed.
    pub timed_out: Vec<MonitorId>,
    /// Instances that ended `FAILED`: initialization failed or the task died.
    pub failed: Vec<MonitorId>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty() && self.failed.is_empty()
    }
}

struct Entry {
    handle: RuntimeHandle,
    pending: Option<MonitorRuntime>,
    task: Option<JoinHandle<()>>,
}

pub struct MonitorManager {
    kinds: BTreeMap<&'static str, Arc<dyn MonitorKind>>,
    deps: RuntimeDeps,
    config: ManagerConfig,
    entries: Vec<Entry>,
    started: bool,
}

impl MonitorManager {
    /// Freezes the catalog's registry; no declarations can be added after
    /// this point.
    pub fn new(
        catalog: MonitorCatalog,
        transport: Arc<dyn Transport>,
        platform: Arc<dyn Platform>,
        config: ManagerConfig,
    ) -> Self {
        let (kinds, registry) = catalog.into_parts();
        Self {
            kinds,
            deps: RuntimeDeps {
                registry,
                transport,
                platform,
                default_interval: config.default_sample_interval,
            },
            config,
            entries: Vec::new(),
            started: false,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.deps.registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates a runtime in `CREATED` for one configured instance.
    pub fn add_monitor(&mut self, raw: RawMonitorConfig) -> Result<MonitorId, ManagerError> {
        if self.started {
            return Err(ManagerError::AlreadyStarted);
        }
        let kind = self
            .kinds
            .get(raw.module.as_str())
            .cloned()
            .ok_or_else(|| ManagerError::UnknownModule(raw.module.clone()))?;

        let runtime = MonitorRuntime::new(kind, raw, self.deps.clone());
        let handle = runtime.handle();
        if self.entries.iter().any(|e| e.handle.id() == handle.id()) {
            return Err(ManagerError::DuplicateId(handle.id().to_string()));
        }

        debug!(monitor = %handle.id(), "Monitor configured");
        let id = handle.id().clone();
        self.entries.push(Entry {
            handle,
            pending: Some(runtime),
            task: None,
        });
        Ok(id)
    }

    pub fn handle(&self, id: &MonitorId) -> Option<RuntimeHandle> {
        self.entries
            .iter()
            .find(|e| e.handle.id() == id)
            .map(|e| e.handle.clone())
    }

    /// Initializes every configured runtime concurrently. Instances that
    /// fail are recorded and left in `FAILED`; the rest start sampling.
    pub async fn start_all(&mut self) -> StartReport {
        self.started = true;
        let mut waiting = Vec::new();

        for entry in &mut self.entries {
            let Some(runtime) = entry.pending.take() else {
                continue;
            };
            let (tx, rx) = oneshot::channel();
            entry.task = Some(tokio::spawn(async move {
                match runtime.initialize().await {
                    Ok(ready) => {
                        let _ = tx.send(Ok(()));
                        ready.run().await;
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.to_string()));
                    }
                }
            }));
            waiting.push((entry.handle.clone(), rx));
        }

        let (handles, receivers): (Vec<_>, Vec<_>) = waiting.into_iter().unzip();
        let outcomes = join_all(receivers).await;

        let mut report = StartReport::default();
        for (handle, outcome) in handles.into_iter().zip(outcomes) {
            match outcome {
                Ok(Ok(())) => report.started.push(handle.id().clone()),
                Ok(Err(reason)) => report.failed.push((handle.id().clone(), reason)),
                Err(_) => {
                    let reason = "initialization panicked".to_string();
                    error!(monitor = %handle.id(), "{reason}");
                    handle.force_failed(reason.clone());
                    report.failed.push((handle.id().clone(), reason));
                }
            }
        }

        info!(
            "Started {} monitor(s), {} failed to initialize",
            report.started.len(),
            report.failed.len()
        );
        report
    }

    /// Requests a stop on every runtime, then waits until `timeout` for them
    /// to reach `STOPPED`. In-flight samples are never interrupted; runtimes
    /// still sampling at the deadline are reported and left to finish.
    pub async fn stop_all(&mut self, timeout: Duration) -> StopReport {
        for entry in &self.entries {
            entry.handle.request_stop();
        }

        let deadline = Instant::now() + timeout;
        let mut report = StopReport::default();

        for entry in &mut self.entries {
            let id = entry.handle.id().clone();

            if entry.pending.take().is_some() {
                entry.handle.transition(RunPhase::Stopped);
                report.stopped.push(id);
                continue;
            }
            let Some(task) = entry.task.as_mut() else {
                continue;
            };

            let outcome = timeout_at(deadline, task).await;
            match outcome {
                Ok(Ok(())) => {
                    entry.task = None;
                    match entry.handle.phase() {
                        RunPhase::Stopped => report.stopped.push(id),
                        phase => {
                            debug!(monitor = %id, "Monitor task ended in {phase}");
                            report.failed.push(id);
                        }
                    }
                }
                Ok(Err(e)) => {
                    entry.task = None;
                    error!(monitor = %id, "Monitor task ended abnormally: {e}");
                    entry.handle.force_failed(format!("monitor task ended abnormally: {e}"));
                    report.failed.push(id);
                }
                Err(_) => {
                    warn!(monitor = %id, "Monitor did not stop within {timeout:?}");
                    report.timed_out.push(id);
                }
            }
        }

        info!(
            "Stopped {} monitor(s), {} timed out, {} failed",
            report.stopped.len(),
            report.timed_out.len(),
            report.failed.len()
        );
        report
    }

    /// Per-instance status in configuration order.
    pub fn status(&self) -> StatusReport {
        let monitors = self.entries.iter().map(|e| e.handle.status()).collect();
        StatusReport::new(monitors, self.config.unhealthy_after)
    }
}
