// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker loop: claim one job at a time, run it, record the outcome.
//!
//! The store's claim is the only coordination between workers. Nothing is
//! locked while a handler runs; every later write is conditional on this
//! worker still holding the job, so a job the orchestrator reaped stays
//! failed even if its handler eventually returns.

use crate::handler::{HandlerError, JobHandler, ProgressSink};
use async_trait::async_trait;
use sj_core::{retry_transient, Clock, Job, JobCounters, JobId, JobKind, RetryPolicy, WorkerId};
use sj_storage::{JobStore, StoreError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// No eligible job for longer than the idle timeout
    Idle,
    /// Termination requested; the in-flight job (if any) was finished first
    Shutdown,
}

/// Outcome of one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(JobId, JobCounters),
    Failed(JobId, String),
    /// The job was taken from this worker (reaped) before the result landed
    Lost(JobId),
}

/// Writes progress messages onto the held job.
struct StoreProgress<'a, S> {
    store: &'a S,
    job: &'a JobId,
    worker: &'a WorkerId,
}

#[async_trait]
impl<'a, S: JobStore> ProgressSink for StoreProgress<'a, S> {
    async fn report(&self, message: &str) {
        debug!(job_id = %self.job, progress = message);
        if let Err(e) = self.store.set_progress(self.job, self.worker, message).await {
            warn!(job_id = %self.job, error = %e, "failed to record progress");
        }
    }
}

pub struct WorkerLoop<S, H, C> {
    store: S,
    handler: H,
    clock: C,
    worker: WorkerId,
    kinds: Vec<JobKind>,
    poll_interval: Duration,
    idle_timeout: Duration,
    retry: RetryPolicy,
}

impl<S, H, C> WorkerLoop<S, H, C>
where
    S: JobStore,
    H: JobHandler,
    C: Clock,
{
    pub fn new(store: S, handler: H, clock: C, worker: WorkerId, kinds: Vec<JobKind>) -> Self {
        Self {
            store,
            handler,
            clock,
            worker,
            kinds,
            poll_interval: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            retry: RetryPolicy::default(),
        }
    }

    sj_core::setters! {
        set {
            poll_interval: Duration,
            idle_timeout: Duration,
            retry: RetryPolicy,
        }
    }

    pub fn worker(&self) -> &WorkerId {
        &self.worker
    }

    /// Run until idle or cancelled.
    ///
    /// Cancellation is only observed between jobs: a handler that is running
    /// when the token fires finishes and its result is recorded.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<WorkerExit, StoreError> {
        info!(
            worker = %self.worker,
            kinds = ?self.kinds,
            idle_timeout_ms = self.idle_timeout.as_millis() as u64,
            "worker started"
        );
        let mut idle_since: Option<u64> = None;

        loop {
            if shutdown.is_cancelled() {
                info!(worker = %self.worker, "shutdown requested, exiting");
                return Ok(WorkerExit::Shutdown);
            }

            if self.run_once().await?.is_some() {
                idle_since = None;
                continue;
            }

            let since = *idle_since.get_or_insert_with(|| self.clock.epoch_ms());
            let idle = self.clock.elapsed_since(since);
            if idle >= self.idle_timeout {
                info!(worker = %self.worker, idle_ms = idle.as_millis() as u64, "idle timeout reached, exiting");
                return Ok(WorkerExit::Idle);
            }

            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Claim and run at most one job. `None` when nothing was eligible.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, StoreError> {
        let claimed = retry_transient(&self.retry, "claim job", || self.store.claim_next(&self.worker, &self.kinds))
            .await?;
        let Some(job) = claimed else {
            return Ok(None);
        };
        info!(job_id = %job.id, kind = %job.kind, url = %job.source_url, "claimed job");

        let started = self.clock.epoch_ms();
        let progress = StoreProgress { store: &self.store, job: &job.id, worker: &self.worker };
        let result = self.handler.handle(&job, &progress).await;
        let elapsed_ms = self.clock.epoch_ms().saturating_sub(started);

        let outcome = match result {
            Ok(counters) => self.record_success(&job, counters, elapsed_ms).await?,
            Err(err) => self.record_failure(&job, &err, elapsed_ms).await?,
        };
        Ok(Some(outcome))
    }

    async fn record_success(
        &self,
        job: &Job,
        counters: JobCounters,
        elapsed_ms: u64,
    ) -> Result<JobOutcome, StoreError> {
        let write = retry_transient(&self.retry, "complete job", || self.store.complete(&job.id, &self.worker, counters))
            .await;
        match write {
            Ok(()) => {
                info!(
                    job_id = %job.id,
                    elapsed_ms,
                    items = counters.items_produced,
                    units = counters.units_processed,
                    "job completed"
                );
                Ok(JobOutcome::Completed(job.id.clone(), counters))
            }
            Err(e) => self.lost_or(job, e),
        }
    }

    async fn record_failure(
        &self,
        job: &Job,
        err: &HandlerError,
        elapsed_ms: u64,
    ) -> Result<JobOutcome, StoreError> {
        let message = err.to_string();
        if err.is_security() {
            warn!(security = true, job_id = %job.id, url = %job.source_url, error = %message, "job rejected");
        } else {
            warn!(job_id = %job.id, elapsed_ms, error = %message, "job failed");
        }
        let write = retry_transient(&self.retry, "fail job", || self.store.fail(&job.id, &self.worker, &message))
            .await;
        match write {
            Ok(()) => Ok(JobOutcome::Failed(job.id.clone(), message)),
            Err(e) => self.lost_or(job, e),
        }
    }

    fn lost_or(&self, job: &Job, err: StoreError) -> Result<JobOutcome, StoreError> {
        match err {
            StoreError::NotHeld { .. } => {
                warn!(job_id = %job.id, worker = %self.worker, "job no longer held, result discarded");
                Ok(JobOutcome::Lost(job.id.clone()))
            }
            other => Err(other),
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
