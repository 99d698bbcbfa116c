// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Nodes never outlive the runtime cap and are never leaked.

use crate::prelude::*;

#[tokio::test]
async fn node_leaked_by_lost_state_is_destroyed_as_orphan() {
    let cluster = Cluster::new();
    cluster.submit_document(0).await;
    let leaked = cluster.control().tick().await.created.unwrap();

    // The state file is lost with the host; the node keeps billing
    cluster.state_file().clear().unwrap();
    let mut control = cluster.control();
    let tick = control.tick().await;

    assert_eq!(tick.destroyed, vec![(leaked.clone(), DestroyReason::Orphan)]);
    assert!(!cluster.provider.nodes().iter().any(|n| n.id == leaked));
}

#[tokio::test]
async fn over_age_nodes_are_destroyed_tracked_or_not() {
    let cluster = Cluster::new();
    let start = cluster.clock.epoch_ms();
    cluster.submit_document(0).await;
    let mut control = cluster.control();
    let tracked = control.tick().await.activated.unwrap();
    cluster.provider.insert(cluster.tagged_node("stray", start));

    cluster.clock.advance(4 * 60 * MINUTE + MINUTE);
    let tick = control.tick().await;

    let mut destroyed = tick.destroyed_ids();
    destroyed.sort();
    let mut expected = vec![tracked, NodeId::from_string("stray")];
    expected.sort();
    assert_eq!(destroyed, expected);
    assert!(tick.destroyed.iter().all(|(_, reason)| *reason == DestroyReason::OverAge));
    assert!(cluster.provider.nodes().is_empty());
    assert!(control.tracked().is_none());
}

#[tokio::test]
async fn destroying_twice_is_harmless() {
    let cluster = Cluster::new();
    cluster.provider.insert(cluster.tagged_node("dup", cluster.clock.epoch_ms()));

    let first = cluster.control().tick().await;
    let second = cluster.control().tick().await;

    assert_eq!(first.destroyed.len(), 1);
    assert!(second.destroyed.is_empty());
    assert!(second.errors.is_empty());
}
