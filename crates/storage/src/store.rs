// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job queue and result record contracts.
//!
//! The job queue is the only resource shared between the control plane and
//! workers. Implementations must make [`JobStore::claim_next`] atomic under
//! concurrent callers: two workers never receive the same job. Every later
//! mutation is a single-row update scoped to the job the caller holds.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sj_core::{
    EmbeddedChunk, Job, JobCounters, JobId, JobKind, NewJob, Transient, TransitionError, WorkerId,
};
use std::time::Duration;
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("job not found: {0}")]
    NotFound(JobId),
    /// The conditional update matched no row: the job is no longer in
    /// `processing` under this worker (reaped, or never claimed by it).
    #[error("job {id} is no longer held by worker {worker}")]
    NotHeld { id: JobId, worker: WorkerId },
    #[error("corrupt row: {0}")]
    Decode(String),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Pending and in-flight job counts for a set of job kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub pending: u64,
    pub processing: u64,
}

impl QueueDepth {
    /// No queued or running work.
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }
}

/// A normalized item from website ingestion, keyed by its source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    pub source_url: String,
    pub company_ref: Option<String>,
    pub title: String,
    pub published_on: NaiveDate,
    pub body: String,
}

/// Durable job queue.
#[async_trait]
pub trait JobStore: Clone + Send + Sync + 'static {
    /// Insert a new job in `pending`.
    async fn enqueue(&self, job: NewJob) -> Result<Job, StoreError>;

    /// Atomically claim the oldest pending job of an eligible kind.
    ///
    /// Returns `None` when nothing eligible is pending (or every candidate is
    /// being claimed by someone else at this instant).
    async fn claim_next(&self, worker: &WorkerId, kinds: &[JobKind]) -> Result<Option<Job>, StoreError>;

    /// Update the human-readable progress message on a held job.
    async fn set_progress(&self, id: &JobId, worker: &WorkerId, message: &str) -> Result<(), StoreError>;

    /// processing → completed, recording counters and duration.
    async fn complete(&self, id: &JobId, worker: &WorkerId, counters: JobCounters) -> Result<(), StoreError>;

    /// processing → failed, recording the error message and duration.
    async fn fail(&self, id: &JobId, worker: &WorkerId, error: &str) -> Result<(), StoreError>;

    /// Force every job in `processing` longer than `threshold` to `failed`.
    ///
    /// Returns the ids transitioned by this call. A second call with nothing
    /// new to reap returns an empty list.
    async fn reap_stuck(&self, threshold: Duration) -> Result<Vec<JobId>, StoreError>;

    async fn queue_depth(&self, kinds: &[JobKind]) -> Result<QueueDepth, StoreError>;

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError>;
}

/// Sink for handler output. Both upserts are idempotent on their natural key.
#[async_trait]
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Upsert chunks keyed by their content-derived id.
    async fn upsert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<u64, StoreError>;

    /// Upsert ingestion records keyed by source URL.
    async fn upsert_records(&self, records: &[IngestRecord]) -> Result<u64, StoreError>;
}

/// Error message recorded on reaped jobs.
pub fn stuck_message(threshold: Duration) -> String {
    format!("stuck in processing for more than {}; presumed abandoned by its worker", sj_core::format_duration(threshold))
}
