// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::Platform;
use std::env;
use std::io;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPlatform;

fn env_value(key: &str) -> io::Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{key} is not set")))
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn can_handle(&self) -> bool {
        true
    }

    fn current_user(&self) -> io::Result<String> {
        env_value("USERNAME")
    }

    fn hostname(&self) -> io::Result<String> {
        env_value("COMPUTERNAME")
    }

    fn file_mode(&self, path: &Path) -> io::Result<Option<u32>> {
        std::fs::metadata(path)?;
        debug!("Permission bits are not available on Windows");
        Ok(None)
    }
}
