// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::Platform;
use nix::unistd::{getuid, gethostname, User};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Generic unix controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixPlatform;

pub(super) fn current_user() -> io::Result<String> {
    let uid = getuid();
    match User::from_uid(uid).map_err(io::Error::from)? {
        Some(user) => Ok(user.name),
        // No passwd entry (common in containers): report the numeric uid.
        None => Ok(uid.to_string()),
    }
}

pub(super) fn hostname() -> io::Result<String> {
    let name = gethostname().map_err(io::Error::from)?;
    name.into_string().map_err(|raw| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("hostname is not valid UTF-8: {raw:?}"),
        )
    })
}

pub(super) fn file_mode(path: &Path) -> io::Result<Option<u32>> {
    let metadata = std::fs::metadata(path)?;
    Ok(Some(metadata.permissions().mode() & 0o7777))
}

impl Platform for PosixPlatform {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn can_handle(&self) -> bool {
        true
    }

    fn current_user(&self) -> io::Result<String> {
        current_user()
    }

    fn hostname(&self) -> io::Result<String> {
        hostname()
    }

    fn file_mode(&self, path: &Path) -> io::Result<Option<u32>> {
        file_mode(path)
    }
}
