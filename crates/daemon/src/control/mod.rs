// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control loop: owns at most one worker node and keeps its cost bounded.
//!
//! Each tick runs, in order:
//!
//! ```text
//!   1. stuck-job reaper        (always)
//!   2. orphan / over-age sweep (always)
//!   3. node state machine      no-node ──▶ provisioning ──▶ active ──▶ no-node
//! ```
//!
//! The tracked node is persisted before it is reachable and every change is
//! written through [`StateFile`], so a restarted control plane resumes where
//! the last one stopped. Steps 1 and 2 run whatever the state machine did
//! or failed to do on the previous tick. A tracked node whose delete failed
//! stays condemned in the state file; every tick retries the delete before
//! anything else and the state machine leaves it alone.

mod provision;
mod supervise;
mod sweep;

use sj_adapters::{
    BootScript, BootstrapChannel, BootstrapError, CredentialError, NodeLayout, NodeProvider, ProviderError,
    WorkerCredentials,
};
pub use sj_core::DestroyReason;
use sj_core::{retry_transient, Clock, JobId, JobKind, NodeId, NodePhase, NodeSpec, RetryPolicy};
use sj_storage::{ControlState, JobStore, StateError, StateFile, StoreError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A health check that times out counts as a live worker. Slow networks
/// should not cause restart loops; a dead worker still fails the check
/// quickly with a non-zero exit.
pub const ASSUME_ALIVE_ON_TIMEOUT: bool = true;

/// Timing and policy knobs for the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSettings {
    /// Job kinds that need the worker node
    pub kinds: Vec<JobKind>,
    pub poll_interval: Duration,
    /// Queue empty (nothing pending or processing) for this long ⇒ destroy
    pub idle_timeout: Duration,
    /// Hard cap on node age, tracked or not
    pub max_runtime: Duration,
    pub stuck_threshold: Duration,
    /// Creation to worker start; exceeding it is fatal for the node
    pub startup_timeout: Duration,
    /// Tick interval while a node is provisioning
    pub boot_poll_interval: Duration,
    pub health_timeout: Duration,
    /// Worker restarts attempted before the node is destroyed
    pub health_retries: u32,
    /// Timeout for the worker start command
    pub command_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            kinds: vec![JobKind::DocumentReport, JobKind::DocumentOther],
            poll_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(10 * 60),
            max_runtime: Duration::from_secs(4 * 3600),
            stuck_threshold: Duration::from_secs(30 * 60),
            startup_timeout: Duration::from_secs(15 * 60),
            boot_poll_interval: Duration::from_secs(10),
            health_timeout: Duration::from_secs(20),
            health_retries: 3,
            command_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// What to ask the provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTemplate {
    pub region: String,
    pub size: String,
    pub image: String,
    /// Every node this system creates carries it; the sweep lists by it
    pub tag: String,
    pub ssh_keys: Vec<String>,
    /// Extra packages for the boot script
    pub packages: Vec<String>,
    pub layout: NodeLayout,
}

impl NodeTemplate {
    pub fn spec(&self, name: String) -> NodeSpec {
        NodeSpec {
            name,
            region: self.region.clone(),
            size: self.size.clone(),
            image: self.image.clone(),
            tag: self.tag.clone(),
            ssh_keys: self.ssh_keys.clone(),
            boot_script: BootScript::new(self.layout.clone()).packages(self.packages.clone()).render(),
        }
    }
}

/// Everything one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reaped: Vec<JobId>,
    pub created: Option<NodeId>,
    pub activated: Option<NodeId>,
    pub destroyed: Vec<(NodeId, DestroyReason)>,
    /// Tracked node the provider no longer knows about
    pub forgotten: Option<NodeId>,
    pub restarted_worker: bool,
    /// Stage failures; later stages still ran
    pub errors: Vec<String>,
}

impl TickReport {
    pub fn destroyed_ids(&self) -> Vec<NodeId> {
        self.destroyed.iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Errors from a control loop stage
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("job store: {0}")]
    Store(#[from] StoreError),
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("bootstrap channel: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("control state: {0}")]
    State(#[from] StateError),
    #[error("credentials: {0}")]
    Credential(#[from] CredentialError),
    #[error("{what} on {address} exited with {code}: {stderr}")]
    Command { what: &'static str, address: String, code: i32, stderr: String },
}

/// External collaborators of the control loop.
pub struct ControlDeps<P, B, S, C> {
    pub provider: P,
    pub channel: B,
    pub store: S,
    pub clock: C,
}

pub struct ControlLoop<P, B, S, C> {
    provider: P,
    channel: B,
    store: S,
    clock: C,
    state_file: StateFile,
    credentials: WorkerCredentials,
    staging_path: PathBuf,
    template: NodeTemplate,
    settings: ControlSettings,
    tracked: Option<ControlState>,
    /// When the queue was first seen empty while a node was active
    idle_since: Option<u64>,
    health_failures: u32,
}

impl<P, B, S, C> ControlLoop<P, B, S, C>
where
    P: NodeProvider,
    B: BootstrapChannel,
    S: JobStore,
    C: Clock,
{
    /// Build the loop, resuming any node recorded in `state_file`.
    pub fn new(
        deps: ControlDeps<P, B, S, C>,
        state_file: StateFile,
        credentials: WorkerCredentials,
        staging_path: impl Into<PathBuf>,
        template: NodeTemplate,
        settings: ControlSettings,
    ) -> Result<Self, ControlError> {
        let tracked = state_file.load()?;
        if let Some(state) = &tracked {
            info!(node_id = %state.node_id, phase = %state.phase, address = ?state.address, "resuming tracked node");
        }
        Ok(Self {
            provider: deps.provider,
            channel: deps.channel,
            store: deps.store,
            clock: deps.clock,
            state_file,
            credentials,
            staging_path: staging_path.into(),
            template,
            settings,
            tracked,
            idle_since: None,
            health_failures: 0,
        })
    }

    pub fn tracked(&self) -> Option<&ControlState> {
        self.tracked.as_ref()
    }

    /// Run until cancelled. A tick in progress when the token fires runs to
    /// the end; the node itself is left alone.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            poll_ms = self.settings.poll_interval.as_millis() as u64,
            tag = %self.template.tag,
            "control loop started"
        );
        while !shutdown.is_cancelled() {
            self.tick().await;
            let wait = match self.tracked.as_ref().map(|s| s.phase) {
                Some(NodePhase::Provisioning) => self.settings.boot_poll_interval,
                _ => self.settings.poll_interval,
            };
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!(tracked = ?self.tracked.as_ref().map(|s| s.node_id.as_str()), "control loop stopped");
    }

    /// One pass: reap, sweep, then advance the node state machine.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let was_tracked = self.tracked.is_some();

        if let Err(e) = self.finish_condemned(&mut report).await {
            note(&mut report, "destroy", e);
        }
        if let Err(e) = self.reap(&mut report).await {
            note(&mut report, "reap", e);
        }
        if let Err(e) = self.sweep(&mut report).await {
            note(&mut report, "sweep", e);
        }
        // A node destroyed by a safety action is replaced on the next tick
        if was_tracked && self.tracked.is_none() {
            return report;
        }
        if self.tracked.as_ref().is_some_and(|s| s.condemned.is_some()) {
            return report;
        }

        let step = match self.tracked.as_ref().map(|s| s.phase) {
            None => self.maybe_provision(&mut report).await,
            Some(NodePhase::Provisioning) => self.advance_provisioning(&mut report).await,
            Some(NodePhase::Active) => self.supervise(&mut report).await,
        };
        if let Err(e) = step {
            note(&mut report, "node", e);
        }
        report
    }

    /// Force stuck jobs to failed; a wedged worker loses its node.
    async fn reap(&mut self, report: &mut TickReport) -> Result<(), ControlError> {
        let threshold = self.settings.stuck_threshold;
        let reaped =
            retry_transient(&self.settings.retry, "reap stuck jobs", || self.store.reap_stuck(threshold)).await?;
        if reaped.is_empty() {
            return Ok(());
        }
        warn!(action = "reap", count = reaped.len(), jobs = ?reaped, "reaped stuck jobs");
        report.reaped = reaped;

        let active = self.tracked.clone().filter(|s| s.phase == NodePhase::Active && s.condemned.is_none());
        if let Some(state) = active {
            self.destroy(&state.node_id, state.address.as_deref(), DestroyReason::StuckJobs, report).await?;
        }
        Ok(())
    }

    /// Retry the delete of a tracked node an earlier tick failed to destroy.
    async fn finish_condemned(&mut self, report: &mut TickReport) -> Result<(), ControlError> {
        let Some(state) = self.tracked.clone() else {
            return Ok(());
        };
        let Some(reason) = state.condemned else {
            return Ok(());
        };
        info!(action = "destroy", node_id = %state.node_id, reason = %reason, "retrying destroy of condemned node");
        self.destroy(&state.node_id, state.address.as_deref(), reason, report).await
    }

    /// Destroy a node and, if it is the tracked one, clear the state.
    ///
    /// The tracked node is marked condemned before the delete is sent, so a
    /// failed delete is retried on the next tick. Deleting an already-deleted
    /// node succeeds, so this is safe to repeat.
    async fn destroy(
        &mut self,
        id: &NodeId,
        address: Option<&str>,
        reason: DestroyReason,
        report: &mut TickReport,
    ) -> Result<(), ControlError> {
        warn!(action = "destroy", node_id = %id, reason = %reason, "destroying node");
        let unmarked = self.tracked.clone().filter(|s| &s.node_id == id && s.condemned.is_none());
        if let Some(state) = unmarked {
            self.persist(state.condemned(reason))?;
        }
        retry_transient(&self.settings.retry, "delete node", || self.provider.delete(id)).await?;
        if let Some(address) = address {
            if let Err(e) = self.channel.forget_host(address).await {
                warn!(node_id = %id, address, error = %e, "failed to forget host key");
            }
        }
        if self.tracked.as_ref().is_some_and(|s| &s.node_id == id) {
            self.untrack()?;
        }
        report.destroyed.push((id.clone(), reason));
        Ok(())
    }

    fn persist(&mut self, state: ControlState) -> Result<(), ControlError> {
        self.state_file.save(&state)?;
        self.tracked = Some(state);
        Ok(())
    }

    fn untrack(&mut self) -> Result<(), ControlError> {
        self.state_file.clear()?;
        self.tracked = None;
        self.idle_since = None;
        self.health_failures = 0;
        Ok(())
    }
}

fn note(report: &mut TickReport, stage: &'static str, err: ControlError) {
    warn!(stage, error = %err, "control loop stage failed");
    report.errors.push(format!("{stage}: {err}"));
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
