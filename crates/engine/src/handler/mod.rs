// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job handlers: thin pipelines over the capability services.
//!
//! A handler turns a claimed job into result counters or a [`HandlerError`]
//! whose message names the failing stage. The worker records either on the
//! job row; handlers never touch job status themselves.

mod document;
mod ingest;

pub use ingest::normalize_date;

use async_trait::async_trait;
use sj_adapters::{
    CapabilityError, Crawler, DocumentSource, Embedder, Extractor, FetchError, VectorIndex,
};
use sj_core::{Chunker, Job, JobCounters, JobKind, RetryPolicy};
use sj_storage::{RecordStore, StoreError};
use thiserror::Error;

/// Why a job failed, by pipeline stage
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("download {verb}: {0}", verb = download_verb(.0))]
    Download(FetchError),
    #[error("extraction failed: {0}")]
    Extraction(CapabilityError),
    #[error("extraction failed: no text in {pages} page(s)")]
    EmptyDocument { pages: u32 },
    #[error("embedding failed: {0}")]
    Embedding(CapabilityError),
    #[error("crawl failed: {0}")]
    Crawl(CapabilityError),
    #[error("persistence failed ({target}): {detail}")]
    Persistence { target: &'static str, detail: String },
}

fn download_verb(err: &FetchError) -> &'static str {
    if err.is_security() {
        "rejected"
    } else {
        "failed"
    }
}

impl HandlerError {
    /// Safety-layer refusal rather than an infrastructure failure.
    pub fn is_security(&self) -> bool {
        matches!(self, HandlerError::Download(e) if e.is_security())
    }

    fn store(target: &'static str, err: StoreError) -> Self {
        HandlerError::Persistence { target, detail: err.to_string() }
    }
}

/// Receives human-readable progress for the job being handled.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, message: &str);
}

/// Runs one claimed job to completion.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &Job, progress: &dyn ProgressSink) -> Result<JobCounters, HandlerError>;
}

/// The document and ingestion pipelines with their collaborators.
#[derive(Clone)]
pub struct Pipelines<R, F, X, E, V, C> {
    records: R,
    source: F,
    extractor: X,
    embedder: E,
    index: V,
    crawler: C,
    chunker: Chunker,
    retry: RetryPolicy,
}

impl<R, F, X, E, V, C> Pipelines<R, F, X, E, V, C>
where
    R: RecordStore,
    F: DocumentSource,
    X: Extractor,
    E: Embedder,
    V: VectorIndex,
    C: Crawler,
{
    pub fn new(records: R, source: F, extractor: X, embedder: E, index: V, crawler: C) -> Self {
        Self {
            records,
            source,
            extractor,
            embedder,
            index,
            crawler,
            chunker: Chunker::default(),
            retry: RetryPolicy::default(),
        }
    }

    sj_core::setters! {
        set {
            chunker: Chunker,
            retry: RetryPolicy,
        }
    }
}

#[async_trait]
impl<R, F, X, E, V, C> JobHandler for Pipelines<R, F, X, E, V, C>
where
    R: RecordStore,
    F: DocumentSource,
    X: Extractor,
    E: Embedder,
    V: VectorIndex,
    C: Crawler,
{
    async fn handle(&self, job: &Job, progress: &dyn ProgressSink) -> Result<JobCounters, HandlerError> {
        match job.kind {
            JobKind::DocumentReport | JobKind::DocumentOther => self.run_document(job, progress).await,
            JobKind::Ingestion => self.run_ingestion(job, progress).await,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
