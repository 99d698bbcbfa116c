// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compute node types shared by the provider adapter and the control loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

crate::define_id! {
    /// Provider-assigned identifier for a compute node.
    pub struct NodeId;
}

/// Status as reported by the node lifecycle provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Created, still booting
    New,
    /// Running and billable
    Active,
    /// Powered off (still billable)
    Off,
    /// Being torn down or archived
    Archived,
}

crate::simple_display! {
    NodeStatus {
        New => "new",
        Active => "active",
        Off => "off",
        Archived => "archived",
    }
}

/// A node as listed or fetched from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub status: NodeStatus,
    /// Public address, assigned some time after boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at_ms: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NodeInfo {
    pub fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.created_at_ms))
    }

    /// Active with an address: reachable over the bootstrap channel.
    pub fn is_reachable(&self) -> bool {
        self.status == NodeStatus::Active && self.address.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Request to create a node.
///
/// The boot script must not carry secrets: credentials are pushed over the
/// bootstrap channel once the node is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    /// Tag used by the orphan sweep to find nodes owned by this system
    pub tag: String,
    /// Provider SSH key ids/fingerprints installed for the bootstrap channel
    pub ssh_keys: Vec<String>,
    pub boot_script: String,
}

/// Where the tracked node is in its lifecycle, as persisted by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePhase {
    /// Created; awaiting boot, readiness, credentials and worker start
    Provisioning,
    /// Worker started; under supervision
    Active,
}

crate::simple_display! {
    NodePhase {
        Provisioning => "provisioning",
        Active => "active",
    }
}

/// Why a node was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyReason {
    /// Older than the max runtime, found by the sweep
    OverAge,
    /// Tagged but not tracked
    Orphan,
    /// Jobs were reaped while it was active
    StuckJobs,
    Idle,
    MaxRuntime,
    HealthCheck,
    StartupTimeout,
    CredentialPush,
    WorkerStart,
}

crate::simple_display! {
    DestroyReason {
        OverAge => "over_age",
        Orphan => "orphan",
        StuckJobs => "stuck_jobs",
        Idle => "idle",
        MaxRuntime => "max_runtime",
        HealthCheck => "health_check",
        StartupTimeout => "startup_timeout",
        CredentialPush => "credential_push",
        WorkerStart => "worker_start",
    }
}
