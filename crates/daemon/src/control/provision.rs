// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! no-node → provisioning → active.

use super::{ControlError, ControlLoop, DestroyReason, TickReport};
use sj_adapters::{BootstrapChannel, BootstrapError, NodeProvider, ProviderError};
use sj_core::{retry_transient, Clock, NodeInfo, Transient};
use sj_storage::{ControlState, JobStore};
use tracing::{debug, info, warn};

/// Outcome of asking the provider about the tracked node.
pub(super) enum Lookup {
    Found(NodeInfo),
    Gone,
}

impl<P, B, S, C> ControlLoop<P, B, S, C>
where
    P: NodeProvider,
    B: BootstrapChannel,
    S: JobStore,
    C: Clock,
{
    /// Create a node when work that needs one is pending.
    pub(super) async fn maybe_provision(&mut self, report: &mut TickReport) -> Result<(), ControlError> {
        let kinds = self.settings.kinds.clone();
        let depth = retry_transient(&self.settings.retry, "queue depth", || self.store.queue_depth(&kinds)).await?;
        if depth.pending == 0 {
            debug!(processing = depth.processing, "no pending work, no node needed");
            return Ok(());
        }

        let now = self.clock.epoch_ms();
        let spec = self.template.spec(format!("{}-{}", self.template.tag, now / 1000));
        info!(action = "create", pending = depth.pending, name = %spec.name, size = %spec.size, "creating node");
        let node = retry_transient(&self.settings.retry, "create node", || self.provider.create(&spec)).await?;

        // Persisted before the node is reachable so a crash here is recoverable
        self.persist(ControlState::provisioning(node.id.clone(), now))?;
        report.created = Some(node.id.clone());
        info!(node_id = %node.id, "node created, awaiting boot");

        self.advance_provisioning(report).await
    }

    /// Move a provisioning node forward as far as it will go this tick.
    ///
    /// Not being ready yet is not an error: the next tick looks again. Every
    /// fatal failure destroys the node and clears the state.
    pub(super) async fn advance_provisioning(&mut self, report: &mut TickReport) -> Result<(), ControlError> {
        let Some(state) = self.tracked.clone() else {
            return Ok(());
        };

        let elapsed = self.clock.elapsed_since(state.created_at_ms);
        if elapsed > self.settings.startup_timeout {
            warn!(
                node_id = %state.node_id,
                elapsed_s = elapsed.as_secs(),
                "node did not start within the startup timeout"
            );
            return self.destroy(&state.node_id, state.address.as_deref(), DestroyReason::StartupTimeout, report).await;
        }

        let node = match self.lookup(report).await? {
            Lookup::Found(node) => node,
            Lookup::Gone => return Ok(()),
        };
        let Some(address) = node.address.clone().filter(|_| node.is_reachable()) else {
            debug!(node_id = %node.id, status = %node.status, "node still booting");
            return Ok(());
        };
        let state = if state.address.as_deref() == Some(address.as_str()) {
            state
        } else {
            let state = state.with_address(address.clone());
            self.persist(state.clone())?;
            info!(node_id = %node.id, address = %address, "node address assigned");
            state
        };

        if !self.boot_finished(&address).await? {
            debug!(node_id = %node.id, address = %address, "boot script not finished");
            return Ok(());
        }

        if let Err(e) = self.push_credentials(&address).await {
            warn!(node_id = %node.id, error = %e, "credential push failed");
            self.destroy(&state.node_id, Some(&address), DestroyReason::CredentialPush, report).await?;
            return Err(e);
        }

        if let Err(e) = self.start_worker(&address).await {
            warn!(node_id = %node.id, error = %e, "worker start failed");
            self.destroy(&state.node_id, Some(&address), DestroyReason::WorkerStart, report).await?;
            return Err(e);
        }

        self.persist(state.activated())?;
        self.idle_since = None;
        self.health_failures = 0;
        report.activated = Some(node.id.clone());
        info!(action = "activate", node_id = %node.id, address = %address, startup_s = elapsed.as_secs(), "worker started");
        Ok(())
    }

    /// Fetch the tracked node; a node the provider no longer knows is forgotten.
    pub(super) async fn lookup(&mut self, report: &mut TickReport) -> Result<Lookup, ControlError> {
        let Some(id) = self.tracked.as_ref().map(|s| s.node_id.clone()) else {
            return Ok(Lookup::Gone);
        };
        match retry_transient(&self.settings.retry, "get node", || self.provider.get(&id)).await {
            Ok(node) => Ok(Lookup::Found(node)),
            Err(ProviderError::NotFound(_)) => {
                warn!(node_id = %id, "tracked node no longer exists, forgetting it");
                self.untrack()?;
                report.forgotten = Some(id);
                Ok(Lookup::Gone)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True once the boot script has written its readiness marker.
    ///
    /// An unreachable ssh daemon means the node is still coming up.
    async fn boot_finished(&self, address: &str) -> Result<bool, ControlError> {
        let check = self.template.layout.readiness_check();
        match self.channel.run_command(address, &check, self.settings.health_timeout).await {
            Ok(out) => Ok(out.success()),
            Err(e) if e.is_transient() => {
                debug!(address, error = %e, "node not reachable yet");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the worker env file locally, copy it over, and delete the local copy.
    async fn push_credentials(&self, address: &str) -> Result<(), ControlError> {
        let local = self.credentials.write_local(&self.staging_path)?;
        let remote = self.template.layout.env_file.as_str();
        retry_transient(&self.settings.retry, "push credentials", || {
            self.channel.copy_file(address, local.path(), remote)
        })
        .await?;
        info!(address, remote, keys = ?self.credentials.keys().collect::<Vec<_>>(), "credentials pushed");
        Ok(())
    }

    pub(super) async fn start_worker(&self, address: &str) -> Result<(), ControlError> {
        let command = self.template.layout.start_worker();
        let timeout = self.settings.command_timeout;
        let out = retry_transient(&self.settings.retry, "start worker", || {
            self.channel.run_command(address, &command, timeout)
        })
        .await?;
        if !out.success() {
            return Err(ControlError::Command {
                what: "worker start",
                address: address.to_string(),
                code: out.code,
                stderr: out.stderr,
            });
        }
        Ok(())
    }
}

/// Timeouts are the only bootstrap failure the health check forgives.
pub(super) fn is_timeout(err: &BootstrapError) -> bool {
    matches!(err, BootstrapError::Timeout { .. })
}
