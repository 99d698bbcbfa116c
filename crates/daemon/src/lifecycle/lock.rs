// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-local advisory lock: at most one control plane per state directory.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("control plane already running: {} is locked{}", .path.display(), holder(.pid))]
    Held { path: PathBuf, pid: Option<u32> },
    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn holder(pid: &Option<u32>) -> String {
    pid.map(|pid| format!(" by pid {pid}")).unwrap_or_default()
}

/// Exclusive lock on the PID file, released on drop.
///
/// The kernel also drops the lock when the process dies, so a crash never
/// leaves a stale lock behind; only the PID text may linger.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock without blocking and record this process id.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let io = |source| LockError::Io { path: path.clone(), source };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        // Don't truncate before holding the lock: that would wipe the
        // running instance's PID.
        let mut file = OpenOptions::new().write(true).create(true).truncate(false).open(&path).map_err(io)?;
        if file.try_lock_exclusive().is_err() {
            let pid = std::fs::read_to_string(&path).ok().and_then(|s| s.trim().parse().ok());
            return Err(LockError::Held { path, pid });
        }

        file.set_len(0).map_err(io)?;
        writeln!(file, "{}", std::process::id()).map_err(io)?;
        file.sync_all().map_err(io)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether some process holds the lock, without taking it.
    pub fn probe(path: impl AsRef<Path>) -> Result<LockStatus, LockError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LockStatus::Free),
            Err(source) => return Err(LockError::Io { path: path.to_path_buf(), source }),
        };
        if file.try_lock_shared().is_ok() {
            let _ = FileExt::unlock(&file);
            return Ok(LockStatus::Free);
        }
        let pid = std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok());
        Ok(LockStatus::Held { pid })
    }
}

/// Result of [`InstanceLock::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Free,
    Held { pid: Option<u32> },
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to clear lock file");
        }
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
