// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::job::{Job, JobKind, NewJob};
use crate::node::{NodeId, NodeInfo, NodeStatus};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::job::{JobKind, JobStatus};
    use proptest::prelude::*;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Pending),
            Just(JobStatus::Processing),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
        ]
    }

    pub fn arb_job_kind() -> impl Strategy<Value = JobKind> {
        prop_oneof![Just(JobKind::DocumentReport), Just(JobKind::DocumentOther), Just(JobKind::Ingestion),]
    }

    /// A worker's action against a job it may or may not hold.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum JobOp {
        Claim,
        Complete,
        Fail,
        Reap,
    }

    pub fn arb_job_op() -> impl Strategy<Value = JobOp> {
        prop_oneof![Just(JobOp::Claim), Just(JobOp::Complete), Just(JobOp::Fail), Just(JobOp::Reap),]
    }
}

// ── Factories ───────────────────────────────────────────────────────────

pub fn new_job(kind: JobKind, url: &str) -> NewJob {
    NewJob::new(kind, url).company("acme")
}

pub fn pending_job(kind: JobKind, created_at_ms: u64) -> Job {
    Job::new(new_job(kind, "https://reports.example.com/annual.pdf"), created_at_ms)
}

pub fn active_node(id: &str, created_at_ms: u64, tag: &str) -> NodeInfo {
    NodeInfo {
        id: NodeId::from_string(id),
        name: format!("worker-{id}"),
        status: NodeStatus::Active,
        address: Some("203.0.113.10".to_string()),
        created_at_ms,
        tags: vec![tag.to_string()],
    }
}
