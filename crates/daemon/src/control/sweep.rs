// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan and over-age sweep.

use super::{note, ControlError, ControlLoop, DestroyReason, TickReport};
use sj_adapters::{BootstrapChannel, NodeProvider};
use sj_core::{retry_transient, Clock};
use sj_storage::JobStore;
use tracing::{debug, warn};

impl<P, B, S, C> ControlLoop<P, B, S, C>
where
    P: NodeProvider,
    B: BootstrapChannel,
    S: JobStore,
    C: Clock,
{
    /// Destroy every tagged node older than the max runtime, tracked or not,
    /// and every tagged node that is not the tracked one.
    pub(super) async fn sweep(&mut self, report: &mut TickReport) -> Result<(), ControlError> {
        let tag = self.template.tag.clone();
        let nodes = retry_transient(&self.settings.retry, "list nodes", || self.provider.list(&tag)).await?;
        let now = self.clock.epoch_ms();
        debug!(action = "sweep", listed = nodes.len(), "sweeping tagged nodes");

        for node in nodes {
            if report.destroyed.iter().any(|(id, _)| id == &node.id) {
                continue;
            }
            let tracked = self.tracked.as_ref().is_some_and(|s| s.node_id == node.id);
            let age = node.age(now);
            let reason = if age > self.settings.max_runtime {
                DestroyReason::OverAge
            } else if !tracked {
                DestroyReason::Orphan
            } else {
                continue;
            };
            warn!(
                action = "sweep",
                node_id = %node.id,
                name = %node.name,
                age_s = age.as_secs(),
                tracked,
                reason = %reason,
                "sweep found node to destroy"
            );
            let address = match self.tracked.as_ref().filter(|_| tracked) {
                Some(state) => state.address.clone(),
                None => node.address.clone(),
            };
            // One failed delete must not shield the remaining nodes
            if let Err(e) = self.destroy(&node.id, address.as_deref(), reason, report).await {
                note(report, "sweep", e);
            }
        }
        Ok(())
    }
}
