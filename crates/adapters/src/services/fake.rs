// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{CapabilityError, Crawler, CrawledItem, Embedder, Extracted, Extractor, VectorIndex};
use async_trait::async_trait;
use parking_lot::Mutex;
use sj_core::EmbeddedChunk;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

fn failure(service: &'static str, status: u16) -> CapabilityError {
    CapabilityError::Status { service, status, body: "injected".to_string() }
}

#[derive(Default)]
struct ExtractorState {
    text: Option<String>,
    page_count: u32,
    failures: VecDeque<u16>,
    calls: Vec<String>,
}

/// Returns the document bytes as UTF-8 text unless a fixed text is set.
#[derive(Clone, Default)]
pub struct FakeExtractor {
    inner: Arc<Mutex<ExtractorState>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&self, text: impl Into<String>, page_count: u32) {
        let mut state = self.inner.lock();
        state.text = Some(text.into());
        state.page_count = page_count;
    }

    /// Fail the next call with the given HTTP status
    pub fn fail_next(&self, status: u16) {
        self.inner.lock().failures.push_back(status);
    }

    /// Source URLs passed to `extract`
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, document: &[u8], source_url: &str) -> Result<Extracted, CapabilityError> {
        let mut state = self.inner.lock();
        state.calls.push(source_url.to_string());
        if let Some(status) = state.failures.pop_front() {
            return Err(failure("extractor", status));
        }
        let text = match &state.text {
            Some(text) => text.clone(),
            None => String::from_utf8_lossy(document).into_owned(),
        };
        Ok(Extracted { text, page_count: state.page_count.max(1) })
    }
}

#[derive(Default)]
struct EmbedderState {
    failures: VecDeque<u16>,
    batches: Vec<usize>,
    short_by: usize,
}

/// Deterministic 3-dimensional vectors derived from text length.
#[derive(Clone, Default)]
pub struct FakeEmbedder {
    inner: Arc<Mutex<EmbedderState>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, status: u16) {
        self.inner.lock().failures.push_back(status);
    }

    /// Return this many fewer vectors than inputs
    pub fn drop_vectors(&self, count: usize) {
        self.inner.lock().short_by = count;
    }

    /// Sizes of the batches embedded so far
    pub fn batches(&self) -> Vec<usize> {
        self.inner.lock().batches.clone()
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let mut state = self.inner.lock();
        if let Some(status) = state.failures.pop_front() {
            return Err(failure("embedder", status));
        }
        state.batches.push(texts.len());
        let keep = texts.len().saturating_sub(state.short_by);
        Ok(texts.iter().take(keep).map(|t| vec![t.len() as f32, t.split_whitespace().count() as f32, 1.0]).collect())
    }
}

#[derive(Default)]
struct IndexState {
    points: BTreeMap<String, EmbeddedChunk>,
    failures: VecDeque<u16>,
    upserts: usize,
}

/// Vector index keyed by chunk id.
#[derive(Clone, Default)]
pub struct FakeVectorIndex {
    inner: Arc<Mutex<IndexState>>,
}

impl FakeVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, status: u16) {
        self.inner.lock().failures.push_back(status);
    }

    pub fn points(&self) -> Vec<EmbeddedChunk> {
        self.inner.lock().points.values().cloned().collect()
    }

    pub fn upserts(&self) -> usize {
        self.inner.lock().upserts
    }
}

#[async_trait]
impl VectorIndex for FakeVectorIndex {
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<(), CapabilityError> {
        let mut state = self.inner.lock();
        if let Some(status) = state.failures.pop_front() {
            return Err(failure("vector index", status));
        }
        state.upserts += 1;
        for chunk in chunks {
            state.points.insert(chunk.chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
struct CrawlerState {
    sites: BTreeMap<String, Vec<CrawledItem>>,
    failures: VecDeque<u16>,
}

/// Serves canned items per site URL; unknown sites yield nothing.
#[derive(Clone, Default)]
pub struct FakeCrawler {
    inner: Arc<Mutex<CrawlerState>>,
}

impl FakeCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, site_url: impl Into<String>, items: Vec<CrawledItem>) {
        self.inner.lock().sites.insert(site_url.into(), items);
    }

    pub fn fail_next(&self, status: u16) {
        self.inner.lock().failures.push_back(status);
    }
}

#[async_trait]
impl Crawler for FakeCrawler {
    async fn crawl(&self, site_url: &str) -> Result<Vec<CrawledItem>, CapabilityError> {
        let mut state = self.inner.lock();
        if let Some(status) = state.failures.pop_front() {
            return Err(failure("crawler", status));
        }
        Ok(state.sites.get(site_url).cloned().unwrap_or_default())
    }
}
