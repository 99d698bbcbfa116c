// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use sj_core::test_support::strategies::{arb_job_op, JobOp};
use sj_core::test_support::{new_job, pending_job};
use sj_core::{Chunk, FakeClock};
use std::collections::HashSet;

const DOCS: &[JobKind] = &[JobKind::DocumentReport, JobKind::DocumentOther];

fn store() -> (MemoryStore<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (MemoryStore::new(clock.clone()), clock)
}

async fn seed(store: &MemoryStore<FakeClock>, clock: &FakeClock, n: usize, kind: JobKind) -> Vec<JobId> {
    let mut ids = Vec::new();
    for i in 0..n {
        let job = store.enqueue(new_job(kind, &format!("https://reports.example.com/{i}.pdf"))).await.unwrap();
        ids.push(job.id);
        clock.advance(Duration::from_millis(10));
    }
    ids
}

#[tokio::test]
async fn claims_oldest_eligible_first() {
    let (store, clock) = store();
    seed(&store, &clock, 1, JobKind::Ingestion).await;
    let docs = seed(&store, &clock, 2, JobKind::DocumentReport).await;

    let worker = WorkerId::new("w1");
    let job = store.claim_next(&worker, DOCS).await.unwrap().unwrap();
    assert_eq!(job.id, docs[0]);
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.claimed_by, Some(worker));
    assert_eq!(job.started_at_ms, Some(clock.epoch_ms()));
}

#[tokio::test]
async fn ineligible_kinds_are_never_claimed() {
    let (store, clock) = store();
    seed(&store, &clock, 2, JobKind::Ingestion).await;
    assert!(store.claim_next(&WorkerId::new("w"), DOCS).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_claim_distinct_jobs() {
    for (workers, jobs) in [(8usize, 5usize), (3, 10), (6, 6)] {
        let (store, clock) = store();
        seed(&store, &clock, jobs, JobKind::DocumentOther).await;

        let mut handles = Vec::new();
        for w in 0..workers {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim_next(&WorkerId::new(format!("w{w}")), DOCS).await.unwrap()
            }));
        }
        let mut claimed = Vec::new();
        for handle in handles {
            if let Some(job) = handle.await.unwrap() {
                claimed.push(job.id);
            }
        }
        let distinct: HashSet<_> = claimed.iter().collect();
        assert_eq!(claimed.len(), workers.min(jobs));
        assert_eq!(distinct.len(), claimed.len());
        assert_eq!(store.jobs_with_status(JobStatus::Processing).len(), workers.min(jobs));
    }
}

#[tokio::test]
async fn only_the_holder_may_finish_a_job() {
    let (store, clock) = store();
    let ids = seed(&store, &clock, 1, JobKind::DocumentReport).await;
    let owner = WorkerId::new("owner");
    let other = WorkerId::new("other");
    store.claim_next(&owner, DOCS).await.unwrap();

    let err = store.complete(&ids[0], &other, JobCounters::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotHeld { .. }));
    let err = store.set_progress(&ids[0], &other, "hijack").await.unwrap_err();
    assert!(matches!(err, StoreError::NotHeld { .. }));

    store.set_progress(&ids[0], &owner, "extracting").await.unwrap();
    clock.advance(Duration::from_secs(3));
    let counters = JobCounters { items_produced: 12, units_processed: 4 };
    store.complete(&ids[0], &owner, counters).await.unwrap();

    let job = store.get(&ids[0]).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters, counters);
    assert_eq!(job.duration_ms, Some(3_000));
}

#[tokio::test]
async fn failing_records_error_and_duration() {
    let (store, clock) = store();
    let ids = seed(&store, &clock, 1, JobKind::DocumentReport).await;
    let worker = WorkerId::new("w");
    store.claim_next(&worker, DOCS).await.unwrap();
    clock.advance(Duration::from_millis(1_500));
    store.fail(&ids[0], &worker, "download: host not allowed").await.unwrap();

    let job = store.get(&ids[0]).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("download: host not allowed"));
    assert_eq!(job.duration_ms, Some(1_500));
    assert_eq!(store.history(&ids[0]), vec![JobStatus::Pending, JobStatus::Processing, JobStatus::Failed]);
}

#[tokio::test]
async fn reaper_fails_stuck_jobs_once() {
    let (store, clock) = store();
    seed(&store, &clock, 2, JobKind::DocumentReport).await;
    let worker = WorkerId::new("wedged");
    let stuck = store.claim_next(&worker, DOCS).await.unwrap().unwrap();
    clock.advance(Duration::from_secs(25 * 60));
    let fresh = store.claim_next(&worker, DOCS).await.unwrap().unwrap();
    clock.advance(Duration::from_secs(10 * 60));

    let threshold = Duration::from_secs(30 * 60);
    let reaped = store.reap_stuck(threshold).await.unwrap();
    assert_eq!(reaped, vec![stuck.id.clone()]);
    assert!(store.reap_stuck(threshold).await.unwrap().is_empty());

    let job = store.get(&stuck.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("stuck in processing"));
    assert_eq!(store.history(&stuck.id).iter().filter(|s| **s == JobStatus::Failed).count(), 1);
    assert_eq!(store.get(&fresh.id).await.unwrap().unwrap().status, JobStatus::Processing);

    // The wedged worker's late completion is rejected
    let err = store.complete(&stuck.id, &worker, JobCounters::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotHeld { .. }));
}

#[tokio::test]
async fn queue_depth_counts_only_requested_kinds() {
    let (store, clock) = store();
    seed(&store, &clock, 3, JobKind::DocumentReport).await;
    seed(&store, &clock, 2, JobKind::Ingestion).await;
    store.claim_next(&WorkerId::new("w"), DOCS).await.unwrap();

    assert_eq!(store.queue_depth(DOCS).await.unwrap(), QueueDepth { pending: 2, processing: 1 });
    assert_eq!(store.queue_depth(&[JobKind::Ingestion]).await.unwrap(), QueueDepth { pending: 2, processing: 0 });
    assert!(!store.queue_depth(DOCS).await.unwrap().is_idle());
    assert!(store.queue_depth(&[JobKind::DocumentOther]).await.unwrap().is_idle());
}

#[tokio::test]
async fn chunk_upserts_are_idempotent() {
    let (store, _) = store();
    let chunk = |i: usize, text: &str| EmbeddedChunk {
        chunk: Chunk::new("job-doc", i, text.to_string()),
        company_ref: Some("acme".to_string()),
        embedding: vec![0.1, 0.2],
    };
    let batch = vec![chunk(0, "alpha beta"), chunk(1, "gamma delta")];
    store.upsert_chunks(&batch).await.unwrap();
    store.upsert_chunks(&batch).await.unwrap();
    assert_eq!(store.chunks().len(), 2);
}

#[tokio::test]
async fn record_upserts_key_on_source_url() {
    let (store, _) = store();
    let record = |title: &str| IngestRecord {
        source_url: "https://acme.example.com/news/1".to_string(),
        company_ref: None,
        title: title.to_string(),
        published_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        body: String::new(),
    };
    store.upsert_records(&[record("first")]).await.unwrap();
    store.upsert_records(&[record("revised")]).await.unwrap();
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "revised");
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

fn is_forward_path(history: &[JobStatus]) -> bool {
    let completed = [JobStatus::Pending, JobStatus::Processing, JobStatus::Completed];
    let failed = [JobStatus::Pending, JobStatus::Processing, JobStatus::Failed];
    history.len() <= 3 && (completed.starts_with(history) || failed.starts_with(history))
}

proptest! {
    #[test]
    fn observed_status_sequence_only_moves_forward(ops in prop::collection::vec((arb_job_op(), 0usize..3), 1..40)) {
        let rt = runtime();
        rt.block_on(async {
            let (store, clock) = store();
            let job = pending_job(JobKind::DocumentReport, clock.epoch_ms());
            let id = job.id.clone();
            store.insert(job);
            let workers = [WorkerId::new("a"), WorkerId::new("b"), WorkerId::new("c")];

            for (op, w) in ops {
                let worker = &workers[w];
                clock.advance(Duration::from_secs(60));
                let _ = match op {
                    JobOp::Claim => store.claim_next(worker, DOCS).await.map(|_| ()),
                    JobOp::Complete => store.complete(&id, worker, JobCounters::default()).await,
                    JobOp::Fail => store.fail(&id, worker, "boom").await,
                    JobOp::Reap => store.reap_stuck(Duration::from_secs(90)).await.map(|_| ()),
                };
            }
            let history = store.history(&id);
            prop_assert!(is_forward_path(&history), "history: {:?}", history);
            Ok(())
        })?;
    }
}
