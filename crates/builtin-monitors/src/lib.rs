// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Monitor kinds shipped with the agent.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use monitor_core::MonitorCatalog;

pub mod tomcat;

pub use tomcat::{TomcatMonitor, TomcatMonitorKind, TomcatStatusParser};

/// Registers every builtin kind with `catalog`.
pub fn register_builtin(catalog: &mut MonitorCatalog) {
    catalog.register(TomcatMonitorKind);
}
