// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node lifecycle provider: create, inspect, list and delete compute nodes.

mod boot;
mod digitalocean;

pub use boot::{BootScript, NodeLayout};
pub use digitalocean::{DigitalOceanProvider, DEFAULT_API_URL};

use async_trait::async_trait;
use sj_core::{NodeId, NodeInfo, NodeSpec, Transient};
use thiserror::Error;

/// Errors from provider API calls
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(String),
    #[error("provider request timed out")]
    Timeout,
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("node not found: {0}")]
    NotFound(NodeId),
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl Transient for ProviderError {
    fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(_) | ProviderError::Timeout => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::NotFound(_) | ProviderError::Decode(_) => false,
        }
    }
}

/// Cloud API for compute nodes.
#[async_trait]
pub trait NodeProvider: Clone + Send + Sync + 'static {
    async fn create(&self, spec: &NodeSpec) -> Result<NodeInfo, ProviderError>;

    /// Current status and address. `NotFound` once the node is gone.
    async fn get(&self, id: &NodeId) -> Result<NodeInfo, ProviderError>;

    /// Every node carrying `tag`.
    async fn list(&self, tag: &str) -> Result<Vec<NodeInfo>, ProviderError>;

    /// Destroy a node. Deleting a node that no longer exists succeeds.
    async fn delete(&self, id: &NodeId) -> Result<(), ProviderError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNodeProvider, ProviderCall};
