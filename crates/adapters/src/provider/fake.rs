// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{NodeProvider, ProviderError};
use async_trait::async_trait;
use parking_lot::Mutex;
use sj_core::{NodeId, NodeInfo, NodeSpec, NodeStatus};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Create { name: String, tag: String },
    Get(NodeId),
    List(String),
    Delete(NodeId),
}

struct FakeProviderState {
    nodes: BTreeMap<NodeId, NodeInfo>,
    calls: Vec<ProviderCall>,
    next_id: u64,
    now_ms: u64,
    /// `get` calls a new node answers with `New` before turning `Active`
    boot_polls: u32,
    pending_boot: BTreeMap<NodeId, u32>,
    create_errors: VecDeque<ProviderError>,
    list_errors: VecDeque<ProviderError>,
    delete_errors: VecDeque<ProviderError>,
}

/// In-memory provider for tests
#[derive(Clone)]
pub struct FakeNodeProvider {
    inner: Arc<Mutex<FakeProviderState>>,
}

impl Default for FakeNodeProvider {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProviderState {
                nodes: BTreeMap::new(),
                calls: Vec::new(),
                next_id: 1000,
                now_ms: 1_700_000_000_000,
                boot_polls: 0,
                pending_boot: BTreeMap::new(),
                create_errors: VecDeque::new(),
                list_errors: VecDeque::new(),
                delete_errors: VecDeque::new(),
            })),
        }
    }
}

impl FakeNodeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creation timestamp stamped on nodes created from now on.
    pub fn set_now_ms(&self, ms: u64) {
        self.inner.lock().now_ms = ms;
    }

    /// Newly created nodes report `New` (no address) for this many `get` calls.
    pub fn set_boot_polls(&self, polls: u32) {
        self.inner.lock().boot_polls = polls;
    }

    /// Add a node that exists at the provider, e.g. a leaked one.
    pub fn insert(&self, node: NodeInfo) {
        self.inner.lock().nodes.insert(node.id.clone(), node);
    }

    pub fn fail_next_create(&self, err: ProviderError) {
        self.inner.lock().create_errors.push_back(err);
    }

    pub fn fail_next_list(&self, err: ProviderError) {
        self.inner.lock().list_errors.push_back(err);
    }

    pub fn fail_next_delete(&self, err: ProviderError) {
        self.inner.lock().delete_errors.push_back(err);
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.inner.lock().nodes.values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.inner.lock().calls.clone()
    }

    pub fn deleted(&self) -> Vec<NodeId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProviderCall::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, ProviderCall::Create { .. })).count()
    }
}

#[async_trait]
impl NodeProvider for FakeNodeProvider {
    async fn create(&self, spec: &NodeSpec) -> Result<NodeInfo, ProviderError> {
        let mut state = self.inner.lock();
        state.calls.push(ProviderCall::Create { name: spec.name.clone(), tag: spec.tag.clone() });
        if let Some(err) = state.create_errors.pop_front() {
            return Err(err);
        }
        state.next_id += 1;
        let id = NodeId::from_string(state.next_id.to_string());
        let node = NodeInfo {
            id: id.clone(),
            name: spec.name.clone(),
            status: NodeStatus::New,
            address: None,
            created_at_ms: state.now_ms,
            tags: vec![spec.tag.clone()],
        };
        let polls = state.boot_polls;
        state.pending_boot.insert(id.clone(), polls);
        state.nodes.insert(id, node.clone());
        Ok(node)
    }

    async fn get(&self, id: &NodeId) -> Result<NodeInfo, ProviderError> {
        let mut state = self.inner.lock();
        state.calls.push(ProviderCall::Get(id.clone()));
        let remaining = state.pending_boot.get(id).copied();
        match remaining {
            Some(0) => {
                state.pending_boot.remove(id);
                let octet = state.nodes.len() % 250 + 1;
                if let Some(node) = state.nodes.get_mut(id) {
                    node.status = NodeStatus::Active;
                    node.address = Some(format!("203.0.113.{octet}"));
                }
            }
            Some(n) => {
                state.pending_boot.insert(id.clone(), n - 1);
            }
            None => {}
        }
        state.nodes.get(id).cloned().ok_or_else(|| ProviderError::NotFound(id.clone()))
    }

    async fn list(&self, tag: &str) -> Result<Vec<NodeInfo>, ProviderError> {
        let mut state = self.inner.lock();
        state.calls.push(ProviderCall::List(tag.to_string()));
        if let Some(err) = state.list_errors.pop_front() {
            return Err(err);
        }
        Ok(state.nodes.values().filter(|n| n.tags.iter().any(|t| t == tag)).cloned().collect())
    }

    async fn delete(&self, id: &NodeId) -> Result<(), ProviderError> {
        let mut state = self.inner.lock();
        state.calls.push(ProviderCall::Delete(id.clone()));
        if let Some(err) = state.delete_errors.pop_front() {
            return Err(err);
        }
        state.nodes.remove(id);
        state.pending_boot.remove(id);
        Ok(())
    }
}
