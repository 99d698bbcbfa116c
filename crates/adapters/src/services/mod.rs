// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External capabilities the job handlers orchestrate: text extraction,
//! embedding, vector indexing and site crawling.

mod http;

pub use http::{HttpCrawler, HttpEmbedder, HttpExtractor, HttpVectorIndex, ServiceClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sj_core::{EmbeddedChunk, Transient};
use thiserror::Error;

/// Errors from capability services
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{service} request failed: {detail}")]
    Http { service: &'static str, detail: String },
    #[error("{service} returned {status}: {body}")]
    Status { service: &'static str, status: u16, body: String },
    #[error("{service} response invalid: {detail}")]
    Decode { service: &'static str, detail: String },
    #[error("{service} returned {got} results for {expected} inputs")]
    Mismatch { service: &'static str, expected: usize, got: usize },
}

impl Transient for CapabilityError {
    fn is_transient(&self) -> bool {
        match self {
            CapabilityError::Http { .. } => true,
            CapabilityError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Text pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    pub text: String,
    pub page_count: u32,
}

/// A dated item found by the crawler, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawledItem {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Date as printed on the page, in whatever format the site uses
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub body: String,
}

#[async_trait]
pub trait Extractor: Clone + Send + Sync + 'static {
    async fn extract(&self, document: &[u8], source_url: &str) -> Result<Extracted, CapabilityError>;
}

#[async_trait]
pub trait Embedder: Clone + Send + Sync + 'static {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError>;
}

#[async_trait]
pub trait VectorIndex: Clone + Send + Sync + 'static {
    /// Upsert points keyed by chunk id.
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<(), CapabilityError>;
}

#[async_trait]
pub trait Crawler: Clone + Send + Sync + 'static {
    async fn crawl(&self, site_url: &str) -> Result<Vec<CrawledItem>, CapabilityError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCrawler, FakeEmbedder, FakeExtractor, FakeVectorIndex};
