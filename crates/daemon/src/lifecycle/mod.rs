// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control plane lifecycle: state directory layout and the singleton lock.

mod lock;

pub use lock::{InstanceLock, LockError, LockStatus};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Control plane file layout under the state directory
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/spotjobs)
    pub state_dir: PathBuf,
    /// Lock/PID file held for the process lifetime
    pub lock_path: PathBuf,
    /// Persisted control-plane state
    pub state_path: PathBuf,
    /// Daily-rolled operator log
    pub log_dir: PathBuf,
    /// Per-address pinned host keys for the bootstrap channel
    pub known_hosts_dir: PathBuf,
    /// Worker env file staged here (mode 0600) while it is pushed
    pub staging_path: PathBuf,
}

impl Config {
    /// Layout under the resolved state directory.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::in_dir(crate::env::state_dir()?))
    }

    pub fn in_dir(state_dir: impl AsRef<Path>) -> Self {
        let state_dir = state_dir.as_ref().to_path_buf();
        Self {
            lock_path: state_dir.join("sjd.pid"),
            state_path: state_dir.join("control.json"),
            log_dir: state_dir.join("logs"),
            known_hosts_dir: state_dir.join("known_hosts"),
            staging_path: state_dir.join("worker.env"),
            state_dir,
        }
    }

    /// Create the state directory tree, owner-only.
    pub fn prepare(&self) -> Result<(), LifecycleError> {
        use std::os::unix::fs::DirBuilderExt;
        for dir in [&self.state_dir, &self.log_dir, &self.known_hosts_dir] {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(dir)
                .map_err(|source| LifecycleError::Io { path: dir.clone(), source })?;
        }
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory (set SJ_STATE_DIR)")]
    NoStateDir,
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
