// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Monitor execution framework for the host monitor agent.
//!
//! A monitor is a plugin that samples one subsystem (an application server, a
//! database, the OS) on a fixed interval and reports each measurement through
//! a [`SampleEmitter`]. This crate owns everything the plugins have in common:
//!
//! - [`Registry`]: declared config options, metrics and log fields per module
//! - [`SampleEmitter`] and [`Transport`]: validation and routing of samples
//! - [`MonitorRuntime`]: the per-instance lifecycle state machine and timer
//! - [`MonitorManager`]: group start/stop and status reporting
//! - [`Platform`]: OS primitives selected once at startup
//!
//! ```text
//! MonitorManager ──spawns──> MonitorRuntime (one task per instance)
//!                                 │ gather_sample()
//!                                 v
//!                            SampleEmitter ──lookup──> Registry
//!                                 │ submit()
//!                                 v
//!                             Transport
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod emitter;
pub mod error;
pub mod manager;
pub mod monitor;
pub mod options;
pub mod parser;
pub mod platform;
pub mod registry;
pub mod runtime;
pub mod sample;
pub mod status;
pub mod transport;
pub mod units;

pub use emitter::{EmitCounts, SampleEmitter};
pub use error::{ConfigError, EmitError, ManagerError, MonitorError, TransientKind, TransportError};
pub use manager::{ManagerConfig, MonitorManager, StartReport, StopReport};
pub use monitor::{InitContext, Monitor, MonitorCatalog, MonitorKind, SampleContext};
pub use options::{MonitorInstanceConfig, OptionType, OptionValue, RawMonitorConfig};
pub use parser::{emit_parsed, ParsedValue, ReportParser};
pub use platform::{detect_platform, Platform};
pub use registry::{ConfigOption, LogField, MetricDefinition, MonitorDefinition, Registry};
pub use runtime::{MonitorRuntime, ReadyRuntime, RunPhase, RunState, RuntimeHandle};
pub use sample::{Fields, MonitorId, SampleRecord, SampleValue};
pub use status::{MonitorStatus, StatusReport};
pub use transport::{ChannelTransport, LogTransport, Transport};
