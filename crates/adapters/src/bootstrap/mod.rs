// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secure bootstrap channel: authenticated, encrypted file copy and remote
//! command execution against a freshly booted node.

mod ssh;

pub use ssh::SshChannel;

use async_trait::async_trait;
use sj_core::Transient;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from the bootstrap channel
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{what} on {address} timed out after {}s", timeout.as_secs())]
    Timeout { what: String, address: String, timeout: Duration },
    /// Could not connect or authenticate (ssh exit 255)
    #[error("{what} on {address}: connection failed: {detail}")]
    Connect { what: String, address: String, detail: String },
    #[error("{what} on {address} exited with {code}: {stderr}")]
    Failed { what: String, address: String, code: i32, stderr: String },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("host key store error: {0}")]
    HostKeys(#[source] std::io::Error),
}

impl Transient for BootstrapError {
    fn is_transient(&self) -> bool {
        matches!(self, BootstrapError::Timeout { .. } | BootstrapError::Connect { .. })
    }
}

/// Result of a remote command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Remote access to a node by address.
#[async_trait]
pub trait BootstrapChannel: Clone + Send + Sync + 'static {
    /// Copy a local file to the node. The remote file is restricted to the
    /// owning user (mode 0600) before this returns.
    async fn copy_file(&self, address: &str, local: &Path, remote: &str) -> Result<(), BootstrapError>;

    /// Run a command. A non-zero remote exit is returned as output, not an
    /// error; transport failures and timeouts are errors.
    async fn run_command(
        &self,
        address: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, BootstrapError>;

    /// Drop any pinned host identity for `address` (the provider may reuse it).
    async fn forget_host(&self, address: &str) -> Result<(), BootstrapError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ChannelCall, FakeChannel};
