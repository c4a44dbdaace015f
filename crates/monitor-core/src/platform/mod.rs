// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! OS primitives monitors may need while initializing.
//!
//! One controller is selected at process startup by [`detect_platform`] and
//! handed to every runtime as an opaque `Arc<dyn Platform>`.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
pub use linux::LinuxPlatform;
#[cfg(unix)]
pub use posix::PosixPlatform;
#[cfg(windows)]
pub use windows::WindowsPlatform;

pub trait Platform: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Whether this controller can run on the current host.
    fn can_handle(&self) -> bool;

    /// Name of the user the agent process runs as.
    fn current_user(&self) -> io::Result<String>;

    fn hostname(&self) -> io::Result<String>;

    /// Permission bits of `path`, `None` where the platform has no such notion.
    fn file_mode(&self, path: &Path) -> io::Result<Option<u32>>;

    /// Whether any local user may read `path`.
    fn is_world_readable(&self, path: &Path) -> io::Result<bool> {
        Ok(self
            .file_mode(path)?
            .map_or(true, |mode| mode & 0o004 != 0))
    }
}

/// Controllers in preference order; the most specific one comes first.
fn candidates() -> Vec<Arc<dyn Platform>> {
    let mut candidates: Vec<Arc<dyn Platform>> = Vec::new();
    #[cfg(target_os = "linux")]
    candidates.push(Arc::new(LinuxPlatform::default()));
    #[cfg(unix)]
    candidates.push(Arc::new(PosixPlatform));
    #[cfg(windows)]
    candidates.push(Arc::new(WindowsPlatform));
    candidates
}

/// Picks the first controller that can handle this host.
pub fn detect_platform() -> Arc<dyn Platform> {
    let mut candidates = candidates();
    let index = candidates
        .iter()
        .position(|p| p.can_handle())
        .unwrap_or(candidates.len().saturating_sub(1));
    let platform = candidates.swap_remove(index);
    debug!("Selected platform controller: {}", platform.name());
    platform
}
