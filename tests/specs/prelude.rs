// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared cluster fixture for specs.

pub use sj_adapters::{
    ChannelCall, FakeChannel, FakeCrawler, FakeEmbedder, FakeExtractor, FakeNodeProvider, FakeSource,
    FakeVectorIndex, NodeLayout, WorkerCredentials,
};
pub use sj_core::{
    Chunker, Clock, FakeClock, JobKind, JobStatus, NewJob, NodeId, NodeInfo, NodePhase, NodeStatus, RetryPolicy,
    WorkerId,
};
pub use sj_daemon::{ControlDeps, ControlLoop, ControlSettings, DestroyReason, NodeTemplate};
pub use sj_engine::{JobOutcome, Pipelines, WorkerLoop};
pub use sj_storage::{JobStore, MemoryStore, StateFile};
pub use std::time::Duration;
pub use tempfile::TempDir;

pub const MINUTE: Duration = Duration::from_secs(60);
pub const TAG: &str = "spotjobs-spec";

pub type Store = MemoryStore<FakeClock>;
pub type Control = ControlLoop<FakeNodeProvider, FakeChannel, Store, FakeClock>;
pub type Handler = Pipelines<Store, FakeSource, FakeExtractor, FakeEmbedder, FakeVectorIndex, FakeCrawler>;
pub type Worker = WorkerLoop<Store, Handler, FakeClock>;

/// One control plane host, one cloud account, one database.
pub struct Cluster {
    pub clock: FakeClock,
    pub store: Store,
    pub provider: FakeNodeProvider,
    pub channel: FakeChannel,
    pub source: FakeSource,
    pub extractor: FakeExtractor,
    pub embedder: FakeEmbedder,
    pub index: FakeVectorIndex,
    pub crawler: FakeCrawler,
    pub dir: TempDir,
}

impl Cluster {
    pub fn new() -> Self {
        let clock = FakeClock::new();
        Self {
            store: MemoryStore::new(clock.clone()),
            clock,
            provider: FakeNodeProvider::new(),
            channel: FakeChannel::new(),
            source: FakeSource::new(),
            extractor: FakeExtractor::new(),
            embedder: FakeEmbedder::new(),
            index: FakeVectorIndex::new(),
            crawler: FakeCrawler::new(),
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn settings(&self) -> ControlSettings {
        ControlSettings { retry: RetryPolicy::none(), ..ControlSettings::default() }
    }

    pub fn state_file(&self) -> StateFile {
        StateFile::new(self.dir.path().join("control.json"))
    }

    /// A control plane process; dropping it and calling again is a restart.
    pub fn control(&self) -> Control {
        let deps = ControlDeps {
            provider: self.provider.clone(),
            channel: self.channel.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
        };
        let template = NodeTemplate {
            region: "tor1".to_string(),
            size: "gpu-small".to_string(),
            image: "base".to_string(),
            tag: TAG.to_string(),
            ssh_keys: Vec::new(),
            packages: Vec::new(),
            layout: NodeLayout::default(),
        };
        let credentials = WorkerCredentials::resolve_with(
            |key| (key == "DATABASE_URL").then(|| "postgres://db/jobs".to_string()),
            None,
        )
        .unwrap();
        ControlLoop::new(
            deps,
            self.state_file(),
            credentials,
            self.dir.path().join("worker.env"),
            template,
            self.settings(),
        )
        .unwrap()
    }

    /// A worker process on the node.
    pub fn worker(&self, name: &str) -> Worker {
        let pipelines = Pipelines::new(
            self.store.clone(),
            self.source.clone(),
            self.extractor.clone(),
            self.embedder.clone(),
            self.index.clone(),
            self.crawler.clone(),
        )
        .chunker(Chunker::new(8, 2))
        .retry(RetryPolicy::none());
        WorkerLoop::new(self.store.clone(), pipelines, self.clock.clone(), WorkerId::new(name), JobKind::ALL.to_vec())
            .retry(RetryPolicy::none())
    }

    /// Enqueue a report document and make its URL downloadable.
    pub async fn submit_document(&self, n: usize) -> sj_core::JobId {
        let url = format!("https://reports.example.com/{n}/annual.pdf");
        self.source.serve(
            &url,
            format!("report {n} covers revenue margins headcount and outlook for the coming fiscal year in detail"),
        );
        self.store.enqueue(NewJob::new(JobKind::DocumentReport, url).company("acme")).await.unwrap().id
    }

    pub fn tagged_node(&self, id: &str, created_at_ms: u64) -> NodeInfo {
        NodeInfo {
            id: NodeId::from_string(id),
            name: format!("{TAG}-{id}"),
            status: NodeStatus::Active,
            address: Some("198.51.100.20".to_string()),
            created_at_ms,
            tags: vec![TAG.to_string()],
        }
    }
}
