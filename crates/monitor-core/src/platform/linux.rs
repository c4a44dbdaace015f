// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{posix, Platform};
use std::io;
use std::path::{Path, PathBuf};

const PROC_SELF_STAT: &str = "/proc/self/stat";

/// Linux controller. Same primitives as posix, but only claims the host when
/// procfs is mounted.
#[derive(Debug, Clone)]
pub struct LinuxPlatform {
    proc_probe: PathBuf,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self {
            proc_probe: PathBuf::from(PROC_SELF_STAT),
        }
    }
}

impl Platform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn can_handle(&self) -> bool {
        self.proc_probe.exists()
    }

    fn current_user(&self) -> io::Result<String> {
        posix::current_user()
    }

    fn hostname(&self) -> io::Result<String> {
        posix::hostname()
    }

    fn file_mode(&self, path: &Path) -> io::Result<Option<u32>> {
        posix::file_mode(path)
    }
}
