// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenSSH-backed bootstrap channel.
//!
//! Host keys are trusted on first use and pinned in a per-address
//! known_hosts file under the state directory, so a key change for a live
//! node fails closed. [`BootstrapChannel::forget_host`] removes the pin when
//! the node is destroyed.

use super::{BootstrapChannel, BootstrapError, CommandOutput};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

/// ssh reserves exit status 255 for its own errors.
const SSH_ERROR_EXIT: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshChannel {
    user: String,
    key_path: PathBuf,
    known_hosts_dir: PathBuf,
    connect_timeout: Duration,
    copy_timeout: Duration,
}

impl SshChannel {
    pub fn new(user: impl Into<String>, key_path: impl Into<PathBuf>, known_hosts_dir: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            key_path: key_path.into(),
            known_hosts_dir: known_hosts_dir.into(),
            connect_timeout: Duration::from_secs(10),
            copy_timeout: Duration::from_secs(60),
        }
    }

    sj_core::setters! {
        set { connect_timeout: Duration, copy_timeout: Duration }
    }

    fn known_hosts(&self, address: &str) -> PathBuf {
        let safe: String =
            address.chars().map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' }).collect();
        self.known_hosts_dir.join(safe)
    }

    /// Options shared by ssh and scp.
    pub(crate) fn common_args(&self, address: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("UserKnownHostsFile={}", self.known_hosts(address).display()),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ]
    }

    fn target(&self, address: &str) -> String {
        format!("{}@{}", self.user, address)
    }

    fn ensure_known_hosts_dir(&self) -> Result<(), BootstrapError> {
        std::fs::create_dir_all(&self.known_hosts_dir).map_err(BootstrapError::HostKeys)
    }

    async fn ssh(&self, address: &str, command: &str, timeout: Duration) -> Result<Output, BootstrapError> {
        self.ensure_known_hosts_dir()?;
        let mut cmd = tokio::process::Command::new("ssh");
        cmd.args(self.common_args(address)).arg(self.target(address)).arg(command);
        run_with_timeout(cmd, timeout, "ssh", address).await
    }
}

/// Run a subprocess, killing it if it outlives `timeout`.
async fn run_with_timeout(
    mut cmd: tokio::process::Command,
    timeout: Duration,
    program: &'static str,
    address: &str,
) -> Result<Output, BootstrapError> {
    cmd.kill_on_drop(true).stdin(std::process::Stdio::null());
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(BootstrapError::Spawn { program, source }),
        Err(_) => Err(BootstrapError::Timeout { what: program.to_string(), address: address.to_string(), timeout }),
    }
}

/// Map a finished ssh/scp process to a result, splitting transport failures
/// (exit 255) from remote exits.
pub(crate) fn classify(what: &str, address: &str, output: Output) -> Result<CommandOutput, BootstrapError> {
    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if code == SSH_ERROR_EXIT {
        return Err(BootstrapError::Connect { what: what.to_string(), address: address.to_string(), detail: stderr });
    }
    Ok(CommandOutput { code, stdout: String::from_utf8_lossy(&output.stdout).into_owned(), stderr })
}

fn require_success(what: &str, address: &str, output: CommandOutput) -> Result<(), BootstrapError> {
    if output.success() {
        return Ok(());
    }
    Err(BootstrapError::Failed {
        what: what.to_string(),
        address: address.to_string(),
        code: output.code,
        stderr: output.stderr,
    })
}

#[async_trait]
impl BootstrapChannel for SshChannel {
    async fn copy_file(&self, address: &str, local: &Path, remote: &str) -> Result<(), BootstrapError> {
        self.ensure_known_hosts_dir()?;
        // Create the destination with owner-only permissions before any bytes land.
        let prepare = format!("umask 077 && touch {remote} && chmod 600 {remote}");
        let prepared = classify("prepare", address, self.ssh(address, &prepare, self.copy_timeout).await?)?;
        require_success("prepare", address, prepared)?;

        let mut cmd = tokio::process::Command::new("scp");
        cmd.args(self.common_args(address))
            .arg("-q")
            .arg(local)
            .arg(format!("{}:{}", self.target(address), remote));
        let copied = classify("scp", address, run_with_timeout(cmd, self.copy_timeout, "scp", address).await?)?;
        require_success("scp", address, copied)?;

        let restrict = format!("chmod 600 {remote}");
        let restricted = classify("chmod", address, self.ssh(address, &restrict, self.copy_timeout).await?)?;
        require_success("chmod", address, restricted)?;
        tracing::info!(%address, remote, "copied file to node");
        Ok(())
    }

    async fn run_command(
        &self,
        address: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, BootstrapError> {
        tracing::debug!(%address, command, "running remote command");
        classify("ssh", address, self.ssh(address, command, timeout).await?)
    }

    async fn forget_host(&self, address: &str) -> Result<(), BootstrapError> {
        match std::fs::remove_file(self.known_hosts(address)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BootstrapError::HostKeys(e)),
        }
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
