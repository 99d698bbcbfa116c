// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A burst of work provisions a node, the worker drains it, the node goes away.

use crate::prelude::*;

#[tokio::test]
async fn burst_of_documents_provisions_drains_and_tears_down() {
    let cluster = Cluster::new();
    let mut control = cluster.control();

    // Nothing pending: nothing to pay for
    assert!(control.tick().await.created.is_none());

    let mut jobs = Vec::new();
    for n in 0..3 {
        jobs.push(cluster.submit_document(n).await);
    }

    let tick = control.tick().await;
    let node = tick.created.clone().unwrap();
    assert_eq!(tick.activated, Some(node.clone()));
    let state = cluster.state_file().load().unwrap().unwrap();
    assert_eq!(state.phase, NodePhase::Active);
    assert_eq!(cluster.channel.copies().len(), 1, "credentials pushed once");
    assert_eq!(cluster.channel.commands_matching("nohup"), 1, "worker started once");

    let worker = cluster.worker("node:1");
    for _ in 0..3 {
        let outcome = worker.run_once().await.unwrap();
        assert!(matches!(outcome, Some(JobOutcome::Completed(..))), "{outcome:?}");
    }
    assert!(worker.run_once().await.unwrap().is_none());
    for id in &jobs {
        let job = cluster.store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.counters.items_produced > 0);
        assert_eq!(cluster.store.history(id), vec![JobStatus::Pending, JobStatus::Processing, JobStatus::Completed]);
    }
    assert!(!cluster.index.points().is_empty());

    // Queue empty: idle timer starts, node survives until the timeout
    let tick = control.tick().await;
    assert!(tick.destroyed.is_empty());
    assert_eq!(cluster.channel.commands_matching("pgrep"), 0, "no health checks without pending work");

    cluster.clock.advance(cluster.settings().idle_timeout);
    let tick = control.tick().await;

    assert_eq!(tick.destroyed, vec![(node, DestroyReason::Idle)]);
    assert!(cluster.state_file().load().unwrap().is_none());
    assert!(cluster.provider.nodes().is_empty());
    assert_eq!(cluster.provider.created(), 1);
}

#[tokio::test]
async fn restarted_control_plane_resumes_provisioning() {
    let cluster = Cluster::new();
    cluster.provider.set_boot_polls(3);
    cluster.submit_document(0).await;

    let node = {
        let mut first = cluster.control();
        let tick = first.tick().await;
        tick.created.unwrap()
    };
    let saved = cluster.state_file().load().unwrap().unwrap();
    assert_eq!(saved.node_id, node);
    assert_eq!(saved.phase, NodePhase::Provisioning);

    let mut second = cluster.control();
    let mut activated = None;
    for _ in 0..5 {
        let tick = second.tick().await;
        assert!(tick.destroyed.is_empty(), "resumed node must not be treated as an orphan");
        if tick.activated.is_some() {
            activated = tick.activated;
            break;
        }
    }

    assert_eq!(activated, Some(node));
    assert_eq!(cluster.provider.created(), 1);
}
