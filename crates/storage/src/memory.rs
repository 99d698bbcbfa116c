// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process store for tests.
//!
//! A single mutex guards the whole queue, so `claim_next` is atomic across
//! tasks the same way a row lock is across database sessions. Mutations go
//! through the [`Job`] transition methods.

use async_trait::async_trait;
use parking_lot::Mutex;
use sj_core::{Clock, EmbeddedChunk, Job, JobCounters, JobId, JobKind, JobStatus, NewJob, WorkerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{stuck_message, IngestRecord, JobStore, QueueDepth, RecordStore, StoreError};

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<JobId, Job>,
    chunks: HashMap<String, EmbeddedChunk>,
    records: HashMap<String, IngestRecord>,
    /// Every status each job has been observed in, in order
    history: HashMap<JobId, Vec<JobStatus>>,
}

impl MemoryState {
    fn record(&mut self, job: &Job) {
        self.history.entry(job.id.clone()).or_default().push(job.status);
    }

    fn held_mut(&mut self, id: &JobId) -> Result<&mut Job, StoreError> {
        self.jobs.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// Job and record store held in memory
#[derive(Clone)]
pub struct MemoryStore<C: Clock> {
    clock: C,
    inner: Arc<Mutex<MemoryState>>,
}

impl<C: Clock> MemoryStore<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, inner: Arc::new(Mutex::new(MemoryState::default())) }
    }

    /// Insert a job row as-is (for seeding stuck or terminal jobs).
    pub fn insert(&self, job: Job) {
        let mut state = self.inner.lock();
        state.record(&job);
        state.jobs.insert(job.id.clone(), job);
    }

    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.inner.lock().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| (a.created_at_ms, &a.id).cmp(&(b.created_at_ms, &b.id)));
        jobs
    }

    pub fn jobs_with_status(&self, status: JobStatus) -> Vec<Job> {
        self.jobs().into_iter().filter(|j| j.status == status).collect()
    }

    /// Statuses the job has passed through, oldest first.
    pub fn history(&self, id: &JobId) -> Vec<JobStatus> {
        self.inner.lock().history.get(id).cloned().unwrap_or_default()
    }

    pub fn chunks(&self) -> Vec<EmbeddedChunk> {
        let mut chunks: Vec<_> = self.inner.lock().chunks.values().cloned().collect();
        chunks.sort_by(|a, b| (&a.chunk.document_id, a.chunk.index).cmp(&(&b.chunk.document_id, b.chunk.index)));
        chunks
    }

    pub fn records(&self) -> Vec<IngestRecord> {
        let mut records: Vec<_> = self.inner.lock().records.values().cloned().collect();
        records.sort_by(|a, b| a.source_url.cmp(&b.source_url));
        records
    }
}

/// Same guard as the SQL store's `WHERE status = 'processing' AND claimed_by = $worker`.
fn check_held(job: &Job, worker: &WorkerId) -> Result<(), StoreError> {
    if job.status == JobStatus::Processing && job.claimed_by.as_ref() == Some(worker) {
        Ok(())
    } else {
        Err(StoreError::NotHeld { id: job.id.clone(), worker: worker.clone() })
    }
}

fn eligible(job: &Job, kinds: &[JobKind]) -> bool {
    job.status == JobStatus::Pending && kinds.contains(&job.kind)
}

#[async_trait]
impl<C: Clock> JobStore for MemoryStore<C> {
    async fn enqueue(&self, new: NewJob) -> Result<Job, StoreError> {
        let job = Job::new(new, self.clock.epoch_ms());
        self.insert(job.clone());
        Ok(job)
    }

    async fn claim_next(&self, worker: &WorkerId, kinds: &[JobKind]) -> Result<Option<Job>, StoreError> {
        let now = self.clock.epoch_ms();
        let mut state = self.inner.lock();
        let next = state
            .jobs
            .values()
            .filter(|j| eligible(j, kinds))
            .min_by(|a, b| (a.created_at_ms, &a.id).cmp(&(b.created_at_ms, &b.id)))
            .map(|j| j.id.clone());
        let Some(id) = next else {
            return Ok(None);
        };
        let job = state.held_mut(&id)?;
        job.claim(worker, now)?;
        let claimed = job.clone();
        state.record(&claimed);
        Ok(Some(claimed))
    }

    async fn set_progress(&self, id: &JobId, worker: &WorkerId, message: &str) -> Result<(), StoreError> {
        let mut state = self.inner.lock();
        let job = state.held_mut(id)?;
        check_held(job, worker)?;
        job.progress_message = Some(message.to_string());
        Ok(())
    }

    async fn complete(&self, id: &JobId, worker: &WorkerId, counters: JobCounters) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut state = self.inner.lock();
        let job = state.held_mut(id)?;
        check_held(job, worker)?;
        job.complete(worker, counters, now)?;
        let job = job.clone();
        state.record(&job);
        Ok(())
    }

    async fn fail(&self, id: &JobId, worker: &WorkerId, error: &str) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut state = self.inner.lock();
        let job = state.held_mut(id)?;
        check_held(job, worker)?;
        job.fail(Some(worker), error, now)?;
        let job = job.clone();
        state.record(&job);
        Ok(())
    }

    async fn reap_stuck(&self, threshold: Duration) -> Result<Vec<JobId>, StoreError> {
        let now = self.clock.epoch_ms();
        let message = stuck_message(threshold);
        let mut state = self.inner.lock();
        let stuck: Vec<JobId> =
            state.jobs.values().filter(|j| j.is_stuck(threshold, now)).map(|j| j.id.clone()).collect();
        for id in &stuck {
            let job = state.held_mut(id)?;
            job.fail(None, message.clone(), now)?;
            let job = job.clone();
            state.record(&job);
        }
        Ok(stuck)
    }

    async fn queue_depth(&self, kinds: &[JobKind]) -> Result<QueueDepth, StoreError> {
        let state = self.inner.lock();
        let mut depth = QueueDepth::default();
        for job in state.jobs.values().filter(|j| kinds.contains(&j.kind)) {
            match job.status {
                JobStatus::Pending => depth.pending += 1,
                JobStatus::Processing => depth.processing += 1,
                JobStatus::Completed | JobStatus::Failed => {}
            }
        }
        Ok(depth)
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.lock().jobs.get(id).cloned())
    }
}

#[async_trait]
impl<C: Clock> RecordStore for MemoryStore<C> {
    async fn upsert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<u64, StoreError> {
        let mut state = self.inner.lock();
        for chunk in chunks {
            state.chunks.insert(chunk.chunk.id.clone(), chunk.clone());
        }
        Ok(chunks.len() as u64)
    }

    async fn upsert_records(&self, records: &[IngestRecord]) -> Result<u64, StoreError> {
        let mut state = self.inner.lock();
        for record in records {
            state.records.insert(record.source_url.clone(), record.clone());
        }
        Ok(records.len() as u64)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
