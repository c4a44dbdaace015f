// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The plugin interface every monitor implements, and the catalog of monitor
//! kinds available to the manager.

use crate::emitter::SampleEmitter;
use crate::error::MonitorError;
use crate::options::MonitorInstanceConfig;
use crate::platform::Platform;
use crate::registry::Registry;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a monitor may use while initializing.
pub struct InitContext<'a> {
    pub config: &'a MonitorInstanceConfig,
    pub platform: &'a dyn Platform,
}

/// Everything a monitor may use during one sampling call.
pub struct SampleContext<'a> {
    emitter: &'a SampleEmitter,
    stop: &'a CancellationToken,
}

impl<'a> SampleContext<'a> {
    pub(crate) fn new(emitter: &'a SampleEmitter, stop: &'a CancellationToken) -> Self {
        Self { emitter, stop }
    }

    pub fn emitter(&self) -> &SampleEmitter {
        self.emitter
    }

    /// Cancelled once a stop was requested. Monitors waiting on I/O can select
    /// on it to return early; the runtime never interrupts them itself.
    pub fn stop_token(&self) -> &CancellationToken {
        self.stop
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Asks the runtime to stop after this sample, e.g. for one-shot monitors.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }
}

/// One configured monitor instance.
///
/// Sampling takes `&mut self` and the runtime awaits each call before starting
/// the next, so implementations never see overlapping calls.
#[async_trait]
pub trait Monitor: Send {
    /// One-time setup, e.g. validating option combinations or opening
    /// connections. An error leaves the instance permanently failed.
    async fn initialize(&mut self, _ctx: &InitContext<'_>) -> Result<(), MonitorError> {
        Ok(())
    }

    /// Gathers one sample and reports it through `ctx.emitter()`.
    async fn gather_sample(&mut self, ctx: &SampleContext<'_>) -> Result<(), MonitorError>;

    /// Releases resources once the runtime stops.
    async fn shutdown(&mut self) {}
}

/// A type of monitor: declares its options and metrics, and builds instances.
pub trait MonitorKind: Send + Sync {
    /// Module name used in configuration and as the metric namespace.
    fn module(&self) -> &'static str;

    /// Registers config options, metrics and log fields under [`Self::module`].
    fn describe_metrics(&self, registry: &mut Registry);

    fn create(&self, config: &MonitorInstanceConfig) -> Result<Box<dyn Monitor>, MonitorError>;
}

/// The fixed set of monitor kinds known to the agent, plus the registry they
/// populated.
#[derive(Default)]
pub struct MonitorCatalog {
    kinds: BTreeMap<&'static str, Arc<dyn MonitorKind>>,
    registry: Registry,
}

impl MonitorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a kind and records its declarations. Registering the same module
    /// twice keeps the latest kind.
    pub fn register<K: MonitorKind + 'static>(&mut self, kind: K) -> &mut Self {
        self.registry.declare_module(kind.module());
        kind.describe_metrics(&mut self.registry);
        self.kinds.insert(kind.module(), Arc::new(kind));
        self
    }

    pub fn kind(&self, module: &str) -> Option<Arc<dyn MonitorKind>> {
        self.kinds.get(module).cloned()
    }

    pub fn modules(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Ends the registration phase.
    pub(crate) fn into_parts(self) -> (BTreeMap<&'static str, Arc<dyn MonitorKind>>, Arc<Registry>) {
        (self.kinds, Arc::new(self.registry))
    }
}
