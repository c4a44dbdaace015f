// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod config;
mod error;
mod logger;

use builtin_monitors::register_builtin;
use config::AgentConfig;
use error::AgentError;
use monitor_core::{
    detect_platform, LogTransport, MonitorCatalog, MonitorManager, RunPhase, StatusReport,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = AgentConfig::from_env();

    let log_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| AgentConfig::default().log_level);
    if let Err(e) = logger::init(&log_level) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}. Shutting down monitor agent.");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Monitor agent exited with error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> Result<(), AgentError> {
    let platform = detect_platform();
    info!(
        platform = platform.name(),
        hostname = %platform.hostname().unwrap_or_default(),
        user = %platform.current_user().unwrap_or_default(),
        "Starting monitor agent"
    );

    let mut catalog = MonitorCatalog::new();
    register_builtin(&mut catalog);
    debug!(
        "Available monitor modules: {}",
        catalog.modules().collect::<Vec<_>>().join(", ")
    );

    let mut manager = MonitorManager::new(
        catalog,
        Arc::new(LogTransport),
        platform,
        config.manager_config(),
    );

    for raw in config.monitors {
        let module = raw.module.clone();
        match manager.add_monitor(raw) {
            Ok(id) => debug!(monitor = %id, "Monitor added"),
            Err(e) => error!("Skipping monitor configuration for '{module}': {e}"),
        }
    }
    if manager.is_empty() {
        warn!("No monitors configured; set AGENT_MONITORS to a JSON list of monitors");
    }

    let started = manager.start_all().await;
    for (id, reason) in &started.failed {
        error!(monitor = %id, "Monitor disabled: {reason}");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut status_ticker = interval_at(
        Instant::now() + config.status_interval,
        config.status_interval,
    );
    status_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let signal_result = loop {
        tokio::select! {
            biased;
            signal = &mut shutdown => break signal,
            _ = status_ticker.tick() => log_status(&manager.status()),
        }
    };

    match &signal_result {
        Ok(name) => info!("Received {name}, stopping monitors"),
        Err(e) => error!("Stopping monitors: {e}"),
    }

    let stopped = manager.stop_all(config.stop_timeout).await;
    for id in &stopped.timed_out {
        warn!(monitor = %id, "Monitor still sampling after {:?}, abandoning it", config.stop_timeout);
    }
    log_status(&manager.status());
    info!("Monitor agent shutdown complete");

    signal_result.map(|_| ())
}

fn log_status(report: &StatusReport) {
    info!(
        healthy = report.is_healthy(),
        "Monitors: {} running, {} sampling, {} failed, {} stopped",
        report.count_in(RunPhase::Running),
        report.count_in(RunPhase::Sampling),
        report.count_in(RunPhase::Failed),
        report.count_in(RunPhase::Stopped)
    );
    for monitor in report.unhealthy() {
        warn!(
            monitor = %monitor.id,
            state = %monitor.state,
            consecutive_failures = monitor.consecutive_failures,
            "Monitor unhealthy: {}",
            monitor.last_error.as_deref().unwrap_or("no error recorded")
        );
    }
    match report.to_json() {
        Ok(json) => debug!("Monitor status: {json}"),
        Err(e) => debug!("Could not serialize monitor status: {e}"),
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str, AgentError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT").map_err(AgentError::from),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str, AgentError> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
