// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sjd status`: persisted control state and queue depth as JSON.

use serde::Serialize;
use sj_core::JobKind;
use sj_storage::{ControlState, JobStore, QueueDepth, StateError, StateFile, StoreError};
use thiserror::Error;

use crate::lifecycle::{Config, InstanceLock, LockError, LockStatus};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// A control plane holds the lock
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Tracked node, if any
    pub node: Option<ControlState>,
    pub kinds: Vec<JobKind>,
    /// Absent when no store was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueDepth>,
}

/// Gather status. Reading never takes the lock or touches the node.
pub async fn collect<S: JobStore>(
    config: &Config,
    store: Option<&S>,
    kinds: &[JobKind],
) -> Result<StatusReport, StatusError> {
    let (running, pid) = match InstanceLock::probe(&config.lock_path)? {
        LockStatus::Free => (false, None),
        LockStatus::Held { pid } => (true, pid),
    };
    let node = StateFile::new(&config.state_path).load()?;
    let queue = match store {
        Some(store) => Some(store.queue_depth(kinds).await?),
        None => None,
    };
    Ok(StatusReport { running, pid, node, kinds: kinds.to_vec(), queue })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
