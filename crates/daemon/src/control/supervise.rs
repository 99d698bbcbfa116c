// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision of the active node: max runtime, idle timeout, worker health.

use super::provision::{is_timeout, Lookup};
use super::{ControlError, ControlLoop, DestroyReason, TickReport, ASSUME_ALIVE_ON_TIMEOUT};
use sj_adapters::{BootstrapChannel, NodeProvider};
use sj_core::{retry_transient, Clock};
use sj_storage::JobStore;
use tracing::{debug, info, warn};

/// Result of one liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Health {
    Alive,
    /// Probe timed out; treated as alive
    Unknown,
    Dead,
}

impl<P, B, S, C> ControlLoop<P, B, S, C>
where
    P: NodeProvider,
    B: BootstrapChannel,
    S: JobStore,
    C: Clock,
{
    pub(super) async fn supervise(&mut self, report: &mut TickReport) -> Result<(), ControlError> {
        let Some(state) = self.tracked.clone() else {
            return Ok(());
        };

        let age = self.clock.elapsed_since(state.created_at_ms);
        if age > self.settings.max_runtime {
            warn!(node_id = %state.node_id, age_s = age.as_secs(), "node reached max runtime");
            return self.destroy(&state.node_id, state.address.as_deref(), DestroyReason::MaxRuntime, report).await;
        }

        if let Lookup::Gone = self.lookup(report).await? {
            return Ok(());
        }

        let kinds = self.settings.kinds.clone();
        let depth = retry_transient(&self.settings.retry, "queue depth", || self.store.queue_depth(&kinds)).await?;

        if depth.is_idle() {
            let now = self.clock.epoch_ms();
            let since = *self.idle_since.get_or_insert(now);
            let idle = self.clock.elapsed_since(since);
            if idle >= self.settings.idle_timeout {
                info!(node_id = %state.node_id, idle_s = idle.as_secs(), "queue idle past timeout");
                return self.destroy(&state.node_id, state.address.as_deref(), DestroyReason::Idle, report).await;
            }
            debug!(node_id = %state.node_id, idle_s = idle.as_secs(), "queue idle");
            return Ok(());
        }
        if self.idle_since.take().is_some() {
            debug!(node_id = %state.node_id, "queue busy again, idle timer reset");
        }

        // Only worth checking while there is work the worker should be taking
        if depth.pending == 0 {
            return Ok(());
        }
        let Some(address) = state.address.clone() else {
            return Ok(());
        };

        match self.probe(&address).await {
            Health::Alive => {
                self.health_failures = 0;
                Ok(())
            }
            Health::Unknown => Ok(()),
            Health::Dead => {
                self.health_failures += 1;
                if self.health_failures > self.settings.health_retries {
                    warn!(
                        node_id = %state.node_id,
                        failures = self.health_failures,
                        "worker health retries exhausted"
                    );
                    return self.destroy(&state.node_id, Some(&address), DestroyReason::HealthCheck, report).await;
                }
                warn!(
                    action = "restart_worker",
                    node_id = %state.node_id,
                    attempt = self.health_failures,
                    of = self.settings.health_retries,
                    pending = depth.pending,
                    "worker not running, restarting"
                );
                report.restarted_worker = true;
                self.start_worker(&address).await
            }
        }
    }

    async fn probe(&self, address: &str) -> Health {
        let check = self.template.layout.liveness_check();
        match self.channel.run_command(address, &check, self.settings.health_timeout).await {
            Ok(out) if out.success() => Health::Alive,
            Ok(out) => {
                debug!(address, code = out.code, "liveness check failed");
                Health::Dead
            }
            Err(e) if ASSUME_ALIVE_ON_TIMEOUT && is_timeout(&e) => {
                debug!(address, error = %e, "liveness check timed out, assuming alive");
                Health::Unknown
            }
            Err(e) => {
                debug!(address, error = %e, "liveness check could not run");
                Health::Dead
            }
        }
    }
}
