// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim exclusivity and stuck-job reaping across the two planes.

use crate::prelude::*;
use std::collections::BTreeSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_workers_claim_each_job_once() {
    let cluster = Cluster::new();
    for n in 0..5 {
        cluster.submit_document(n).await;
    }

    let mut handles = Vec::new();
    for w in 0..8 {
        let store = cluster.store.clone();
        handles.push(tokio::spawn(async move {
            store.claim_next(&WorkerId::new(format!("node:{w}")), &[JobKind::DocumentReport]).await.unwrap()
        }));
    }
    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap() {
            claimed.push(job.id);
        }
    }

    let distinct: BTreeSet<_> = claimed.iter().cloned().collect();
    assert_eq!(claimed.len(), 5);
    assert_eq!(distinct.len(), 5);
}

#[tokio::test]
async fn wedged_worker_loses_its_job_and_its_node() {
    let cluster = Cluster::new();
    let job = cluster.submit_document(0).await;
    let mut control = cluster.control();
    let node = control.tick().await.activated.unwrap();

    // The worker claims the job and then hangs
    let wedged = WorkerId::new("node:wedged");
    cluster.store.claim_next(&wedged, &[JobKind::DocumentReport]).await.unwrap().unwrap();

    cluster.clock.advance(31 * MINUTE);
    let tick = control.tick().await;

    assert_eq!(tick.reaped, vec![job.clone()]);
    assert_eq!(tick.destroyed, vec![(node, DestroyReason::StuckJobs)]);
    let failed = cluster.store.get(&job).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);

    // Reaping is idempotent and the late worker cannot resurrect the job
    assert!(control.tick().await.reaped.is_empty());
    let late = cluster.store.complete(&job, &wedged, Default::default()).await;
    assert!(late.is_err());
    assert_eq!(cluster.store.history(&job), vec![JobStatus::Pending, JobStatus::Processing, JobStatus::Failed]);
}
