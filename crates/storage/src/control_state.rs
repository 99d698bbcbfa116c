// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable control-plane state.
//!
//! Holds the minimal facts needed to resume supervising a node after a
//! restart. The node id is written as soon as the provider returns it, before
//! the node is reachable, so a crash mid-provision leaves a record the next
//! process can pick up (or destroy).
//!
//! Writes go to a sibling temp file that is fsynced and renamed over the
//! target, so a reader sees either the old state or the new one.

use serde::{Deserialize, Serialize};
use sj_core::{DestroyReason, NodeId, NodePhase};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current state file schema version
pub const CURRENT_STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file {path} has version {found}, this build understands up to {CURRENT_STATE_VERSION}")]
    UnsupportedVersion { path: PathBuf, found: u32 },
}

/// The node currently owned by this control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    #[serde(rename = "v")]
    pub version: u32,
    pub node_id: NodeId,
    /// Public address, once the provider has assigned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at_ms: u64,
    pub phase: NodePhase,
    /// Set once the node has been marked for destruction; the delete is
    /// retried every tick until the provider confirms it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condemned: Option<DestroyReason>,
}

impl ControlState {
    pub fn provisioning(node_id: NodeId, created_at_ms: u64) -> Self {
        Self { version: CURRENT_STATE_VERSION, node_id, address: None, created_at_ms, phase: NodePhase::Provisioning, condemned: None }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn activated(mut self) -> Self {
        self.phase = NodePhase::Active;
        self
    }

    pub fn condemned(mut self, reason: DestroyReason) -> Self {
        self.condemned = Some(reason);
        self
    }
}

/// JSON file holding at most one [`ControlState`].
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: std::io::Error) -> StateError {
        StateError::Io { path: self.path.clone(), source }
    }

    /// Load the persisted state, `None` if there is none.
    ///
    /// An unparseable file is moved aside to `.bak` and treated as absent:
    /// the node it described becomes an orphan and the next sweep destroys it.
    pub fn load(&self) -> Result<Option<ControlState>, StateError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io(e)),
        };
        let state: ControlState = match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                let bak = self.path.with_extension("bak");
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %bak.display(),
                    error = %e,
                    "corrupt control state, moving aside"
                );
                fs::rename(&self.path, &bak).map_err(|e| self.io(e))?;
                return Ok(None);
            }
        };
        if state.version > CURRENT_STATE_VERSION {
            return Err(StateError::UnsupportedVersion { path: self.path.clone(), found: state.version });
        }
        Ok(Some(state))
    }

    pub fn save(&self, state: &ControlState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(state)?;
        {
            let mut file = File::create(&tmp).map_err(|e| self.io(e))?;
            file.write_all(&json).map_err(|e| self.io(e))?;
            file.sync_all().map_err(|e| self.io(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.io(e))?;
        Ok(())
    }

    /// Remove the state file. Clearing an absent file is a no-op.
    pub fn clear(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io(e)),
        }
    }
}

#[cfg(test)]
#[path = "control_state_tests.rs"]
mod tests;
