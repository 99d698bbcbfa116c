// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and status state machine.
//!
//! Status only ever moves forward:
//!
//! ```text
//! pending ──claim──▶ processing ──┬──▶ completed
//!                                 └──▶ failed
//! ```
//!
//! `started_at_ms` is stamped exactly once by [`Job::claim`], and
//! `completed_at_ms` / `duration_ms` exactly once on entry to a terminal
//! state. Stores that cannot call these methods directly (SQL) encode the
//! same guards in their `WHERE` clauses.

use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a job row.
    ///
    /// Assigned by the producer that enqueues the job; opaque to the worker
    /// and orchestrator.
    pub struct JobId("job-");
}

/// Processing pipeline a job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Company report document (annual report, filing)
    DocumentReport,
    /// Any other document
    DocumentOther,
    /// Website ingestion
    Ingestion,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::DocumentReport, JobKind::DocumentOther, JobKind::Ingestion];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::DocumentReport => "document_report",
            JobKind::DocumentOther => "document_other",
            JobKind::Ingestion => "ingestion",
        }
    }

    /// Whether jobs of this kind run through the document pipeline.
    pub fn is_document(&self) -> bool {
        matches!(self, JobKind::DocumentReport | JobKind::DocumentOther)
    }
}

crate::simple_display! {
    JobKind {
        DocumentReport => "document_report",
        DocumentOther => "document_other",
        Ingestion => "ingestion",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job kind: {0}")]
pub struct UnknownJobKind(pub String);

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "document_report" | "document-report" => Ok(JobKind::DocumentReport),
            "document_other" | "document-other" => Ok(JobKind::DocumentOther),
            "ingestion" => Ok(JobKind::Ingestion),
            other => Err(UnknownJobKind(other.to_string())),
        }
    }
}

/// Parse a comma-separated list of job kinds (e.g. from an env var).
pub fn parse_kinds(list: &str) -> Result<Vec<JobKind>, UnknownJobKind> {
    let mut kinds = Vec::new();
    for part in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = part.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Status of a job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status: {0}")]
pub struct UnknownJobStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownJobStatus(other.to_string())),
        }
    }
}

/// Result counters recorded on completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    /// Records produced (chunks for documents, items for ingestion)
    pub items_produced: u64,
    /// Sub-units processed (pages for documents, crawled items for ingestion)
    pub units_processed: u64,
}

/// A job as enqueued by an upstream producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub id: JobId,
    pub kind: JobKind,
    pub source_url: String,
    pub company_ref: Option<String>,
}

impl NewJob {
    pub fn new(kind: JobKind, source_url: impl Into<String>) -> Self {
        Self { id: JobId::new(), kind, source_url: source_url.into(), company_ref: None }
    }

    pub fn company(mut self, company_ref: impl Into<String>) -> Self {
        self.company_ref = Some(company_ref.into());
        self
    }
}

/// Illegal job mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {id}: illegal transition {from} -> {to}")]
    Illegal { id: JobId, from: JobStatus, to: JobStatus },
    #[error("job {id} is not held by worker {worker}")]
    NotOwner { id: JobId, worker: WorkerId },
}

/// A row in the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_ref: Option<String>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub counters: JobCounters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Worker that claimed the job (set with `started_at_ms`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<WorkerId>,
}

impl Job {
    pub fn new(new: NewJob, created_at_ms: u64) -> Self {
        Self {
            id: new.id,
            kind: new.kind,
            status: JobStatus::Pending,
            source_url: new.source_url,
            company_ref: new.company_ref,
            created_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
            progress_message: None,
            error_message: None,
            counters: JobCounters::default(),
            duration_ms: None,
            claimed_by: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the job has sat in `processing` longer than `threshold`.
    pub fn is_stuck(&self, threshold: Duration, now_ms: u64) -> bool {
        self.status == JobStatus::Processing
            && self
                .started_at_ms
                .is_some_and(|started| now_ms.saturating_sub(started) > threshold.as_millis() as u64)
    }

    /// pending → processing, stamping `started_at_ms` and the owner.
    pub fn claim(&mut self, worker: &WorkerId, now_ms: u64) -> Result<(), TransitionError> {
        self.check_transition(JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.started_at_ms = Some(now_ms);
        self.claimed_by = Some(worker.clone());
        self.progress_message = Some("claimed".to_string());
        Ok(())
    }

    /// processing → completed. Only the owning worker may complete.
    pub fn complete(
        &mut self,
        worker: &WorkerId,
        counters: JobCounters,
        now_ms: u64,
    ) -> Result<(), TransitionError> {
        self.check_owner(worker)?;
        self.check_transition(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.counters = counters;
        self.progress_message = Some("completed".to_string());
        self.finish(now_ms);
        Ok(())
    }

    /// processing → failed. `worker` is `None` when the reaper forces it.
    pub fn fail(
        &mut self,
        worker: Option<&WorkerId>,
        error: impl Into<String>,
        now_ms: u64,
    ) -> Result<(), TransitionError> {
        if let Some(worker) = worker {
            self.check_owner(worker)?;
        }
        self.check_transition(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.finish(now_ms);
        Ok(())
    }

    fn finish(&mut self, now_ms: u64) {
        if self.completed_at_ms.is_none() {
            self.completed_at_ms = Some(now_ms);
            self.duration_ms = self.started_at_ms.map(|started| now_ms.saturating_sub(started));
        }
    }

    fn check_transition(&self, to: JobStatus) -> Result<(), TransitionError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError::Illegal { id: self.id.clone(), from: self.status, to })
        }
    }

    fn check_owner(&self, worker: &WorkerId) -> Result<(), TransitionError> {
        if self.claimed_by.as_ref() == Some(worker) {
            Ok(())
        } else {
            Err(TransitionError::NotOwner { id: self.id.clone(), worker: worker.clone() })
        }
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = JobId::new(),
            source_url: String = "https://example.com/report.pdf",
        }
        set {
            kind: JobKind = JobKind::DocumentReport,
            status: JobStatus = JobStatus::Pending,
            created_at_ms: u64 = 1_000_000,
            started_at_ms: Option<u64> = None,
            completed_at_ms: Option<u64> = None,
            counters: JobCounters = JobCounters::default(),
            duration_ms: Option<u64> = None,
            claimed_by: Option<WorkerId> = None,
        }
        option {
            company_ref: String = None,
            progress_message: String = None,
            error_message: String = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
