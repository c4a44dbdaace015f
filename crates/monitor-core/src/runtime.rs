// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of one monitor instance.
//!
//! ```text
//! CREATED ─> INITIALIZING ─> RUNNING <─> SAMPLING
//!                 │             │
//!                 v             v
//!              FAILED       STOPPING ─> STOPPED
//! ```
//!
//! The run loop owns the monitor and awaits every sampling call before it
//! arms the timer again, which is what keeps samples of one instance from
//! overlapping. A stop request is only observed while `RUNNING`; a sample in
//! progress always completes first.

use crate::emitter::{EmitCounts, SampleEmitter};
use crate::error::{ConfigError, MonitorError};
use crate::monitor::{InitContext, Monitor, MonitorKind, SampleContext};
use crate::options::{MonitorInstanceConfig, RawMonitorConfig};
use crate::platform::Platform;
use crate::registry::Registry;
use crate::sample::MonitorId;
use crate::status::MonitorStatus;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Created,
    Initializing,
    Running,
    Sampling,
    Stopping,
    Stopped,
    Failed,
}

impl RunPhase {
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Created, Initializing)
                | (Created, Stopped)
                | (Initializing, Running)
                | (Initializing, Failed)
                | (Running, Sampling)
                | (Running, Stopping)
                | (Running, Failed)
                | (Sampling, Running)
                | (Stopping, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Stopped | RunPhase::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Created => "CREATED",
            RunPhase::Initializing => "INITIALIZING",
            RunPhase::Running => "RUNNING",
            RunPhase::Sampling => "SAMPLING",
            RunPhase::Stopping => "STOPPING",
            RunPhase::Stopped => "STOPPED",
            RunPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Mutable state of one runtime. Written only by the runtime's own task
/// (and by the manager for instances that never started).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub phase: RunPhase,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub samples_completed: u64,
    pub last_sample_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: RunPhase::Created,
            consecutive_failures: 0,
            total_failures: 0,
            samples_completed: 0,
            last_sample_at: None,
            last_success_at: None,
            last_error: None,
        }
    }
}

/// Shared view of a runtime: state for status readers, and the stop flag.
#[derive(Clone)]
pub struct RuntimeHandle {
    id: MonitorId,
    state: Arc<Mutex<RunState>>,
    stop: CancellationToken,
    emitter_counts: Arc<Mutex<EmitCounts>>,
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .finish()
    }
}

impl RuntimeHandle {
    fn new(id: MonitorId) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(RunState::default())),
            stop: CancellationToken::new(),
            emitter_counts: Arc::new(Mutex::new(EmitCounts::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &MonitorId {
        &self.id
    }

    pub fn phase(&self) -> RunPhase {
        self.lock().phase
    }

    pub fn snapshot(&self) -> RunState {
        self.lock().clone()
    }

    /// Requests a cooperative stop, observed at the next safe point.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn status(&self) -> MonitorStatus {
        let counts = *self
            .emitter_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        MonitorStatus::new(&self.id, self.snapshot(), counts)
    }

    /// Applies a transition if the state machine allows it.
    pub(crate) fn transition(&self, next: RunPhase) -> bool {
        let mut state = self.lock();
        if state.phase.can_transition_to(next) {
            debug!(monitor = %self.id, "{} -> {}", state.phase, next);
            state.phase = next;
            true
        } else {
            error!(
                monitor = %self.id,
                "Refusing invalid runtime transition {} -> {}", state.phase, next
            );
            false
        }
    }

    /// Marks the instance failed regardless of where it was, used when its
    /// task died outside any sampling call.
    pub(crate) fn force_failed(&self, reason: String) {
        let mut state = self.lock();
        state.phase = RunPhase::Failed;
        state.last_error = Some(reason);
    }

    fn record_success(&self, at: DateTime<Utc>) {
        let mut state = self.lock();
        state.samples_completed += 1;
        state.consecutive_failures = 0;
        state.last_sample_at = Some(at);
        state.last_success_at = Some(at);
    }

    fn record_failure(&self, at: DateTime<Utc>, reason: String) -> u32 {
        let mut state = self.lock();
        state.samples_completed += 1;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.total_failures += 1;
        state.last_sample_at = Some(at);
        state.last_error = Some(reason);
        state.consecutive_failures
    }

    fn record_init_failure(&self, reason: String) {
        self.lock().last_error = Some(reason);
    }

    fn publish_counts(&self, counts: EmitCounts) {
        *self
            .emitter_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = counts;
    }
}

/// Collaborators every runtime receives from the manager.
#[derive(Clone)]
pub struct RuntimeDeps {
    pub registry: Arc<Registry>,
    pub transport: Arc<dyn Transport>,
    pub platform: Arc<dyn Platform>,
    pub default_interval: Duration,
}

/// A runtime in `CREATED`: configuration received, nothing acquired yet.
pub struct MonitorRuntime {
    handle: RuntimeHandle,
    kind: Arc<dyn MonitorKind>,
    raw: RawMonitorConfig,
    deps: RuntimeDeps,
}

impl MonitorRuntime {
    pub fn new(kind: Arc<dyn MonitorKind>, raw: RawMonitorConfig, deps: RuntimeDeps) -> Self {
        let id = MonitorId::new(kind.module(), raw.id.clone());
        Self {
            handle: RuntimeHandle::new(id),
            kind,
            raw,
            deps,
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Runs `INITIALIZING` once: resolves options against the module's
    /// declarations, builds the monitor and lets it set itself up.
    ///
    /// On error the runtime ends in `FAILED` and is consumed; it can never
    /// be scheduled.
    pub async fn initialize(self) -> Result<ReadyRuntime, MonitorError> {
        let MonitorRuntime {
            handle,
            kind,
            raw,
            deps,
        } = self;
        handle.transition(RunPhase::Initializing);

        match setup(kind.as_ref(), &raw, &deps).await {
            Ok((monitor, config)) => {
                let emitter =
                    SampleEmitter::new(handle.id.clone(), deps.registry, deps.transport);
                handle.transition(RunPhase::Running);
                info!(
                    monitor = %handle.id,
                    "Monitor initialized, sampling every {:?}",
                    config.sample_interval()
                );
                Ok(ReadyRuntime {
                    handle,
                    monitor,
                    config,
                    emitter,
                })
            }
            Err(e) => {
                error!(monitor = %handle.id, "Monitor failed to initialize and will not run: {e}");
                handle.record_init_failure(e.to_string());
                handle.transition(RunPhase::Failed);
                Err(e)
            }
        }
    }
}

async fn setup(
    kind: &dyn MonitorKind,
    raw: &RawMonitorConfig,
    deps: &RuntimeDeps,
) -> Result<(Box<dyn Monitor>, MonitorInstanceConfig), MonitorError> {
    let definition = deps
        .registry
        .definition(kind.module())
        .ok_or_else(|| ConfigError::UnknownModule(kind.module().to_string()))?;
    let config = MonitorInstanceConfig::resolve(definition, raw, deps.default_interval)?;
    let mut monitor = kind.create(&config)?;
    let ctx = InitContext {
        config: &config,
        platform: deps.platform.as_ref(),
    };
    monitor.initialize(&ctx).await?;
    Ok((monitor, config))
}

/// A runtime that initialized successfully and sits in `RUNNING`.
pub struct ReadyRuntime {
    handle: RuntimeHandle,
    monitor: Box<dyn Monitor>,
    config: MonitorInstanceConfig,
    emitter: SampleEmitter,
}

impl ReadyRuntime {
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &MonitorInstanceConfig {
        &self.config
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// The scheduling loop. The first sample is taken one interval after
    /// entering `RUNNING`, then at a fixed rate; an overrunning sample delays
    /// the next tick instead of bursting.
    pub async fn run(self) {
        let ReadyRuntime {
            handle,
            mut monitor,
            config,
            emitter,
        } = self;
        let period = config.sample_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = handle.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !handle.transition(RunPhase::Sampling) {
                break;
            }
            sample_once(&handle, monitor.as_mut(), &emitter).await;
            handle.transition(RunPhase::Running);
        }

        handle.transition(RunPhase::Stopping);
        monitor.shutdown().await;
        handle.publish_counts(emitter.counts());
        handle.transition(RunPhase::Stopped);
        info!(monitor = %handle.id, "Monitor stopped");
    }
}

async fn sample_once(handle: &RuntimeHandle, monitor: &mut dyn Monitor, emitter: &SampleEmitter) {
    let before = emitter.counts();
    let ctx = SampleContext::new(emitter, &handle.stop);
    let outcome = AssertUnwindSafe(monitor.gather_sample(&ctx))
        .catch_unwind()
        .await;
    let finished_at = Utc::now();

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(format!("sampling panicked: {}", panic_message(&payload))),
    };

    match failure {
        None => handle.record_success(finished_at),
        Some(reason) => {
            let consecutive = handle.record_failure(finished_at, reason.clone());
            error!(
                monitor = %handle.id,
                namespace = handle.id.module(),
                consecutive_failures = consecutive,
                "Failed to gather sample: {reason}"
            );
        }
    }

    let after = emitter.counts();
    let delta = after.since(&before);
    if delta.rejected > 0 {
        error!(
            monitor = %handle.id,
            "{} emission(s) of unregistered metrics were rejected during this sample",
            delta.rejected
        );
    }
    if delta.transport_failures > 0 {
        warn!(
            monitor = %handle.id,
            "{} record(s) could not be handed to the transport during this sample",
            delta.transport_failures
        );
    }
    handle.publish_counts(after);
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
