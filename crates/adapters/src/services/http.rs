// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-over-HTTP clients for the capability services.

use super::{CapabilityError, Crawler, CrawledItem, Embedder, Extracted, Extractor, VectorIndex};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sj_core::EmbeddedChunk;
use std::time::Duration;

/// Base URL, optional bearer key and a shared connection pool.
#[derive(Clone)]
pub struct ServiceClient {
    service: &'static str,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ServiceClient {
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CapabilityError::Http { service, detail: format!("failed to create HTTP client: {e}") })?;
        Ok(Self { service, client, base_url: base_url.into().trim_end_matches('/').to_string(), api_key })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<R: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<R, CapabilityError> {
        let service = self.service;
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        let response =
            request.send().await.map_err(|e| CapabilityError::Http { service, detail: e.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Status {
                service,
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }
        response.json().await.map_err(|e| CapabilityError::Decode { service, detail: e.to_string() })
    }

    pub async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, CapabilityError> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    pub async fn post_bytes<R: DeserializeOwned>(
        &self,
        path: &str,
        bytes: Vec<u8>,
        query: &[(&str, &str)],
    ) -> Result<R, CapabilityError> {
        let request = self
            .client
            .post(self.url(path))
            .query(query)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        self.send(request).await
    }
}

/// `POST /extract` with the raw document; returns text and page count.
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: ServiceClient,
}

impl HttpExtractor {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, document: &[u8], source_url: &str) -> Result<Extracted, CapabilityError> {
        self.client.post_bytes("extract", document.to_vec(), &[("source_url", source_url)]).await
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
pub(crate) struct EmbedResponse {
    pub(crate) embeddings: Vec<Vec<f32>>,
}

/// `POST /embed` in batches.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: ServiceClient,
    batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(client: ServiceClient, batch_size: usize) -> Self {
        Self { client, batch_size: batch_size.max(1) }
    }
}

pub(crate) fn check_count(expected: usize, got: usize) -> Result<(), CapabilityError> {
    if expected != got {
        return Err(CapabilityError::Mismatch { service: "embedder", expected, got });
    }
    Ok(())
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let response: EmbedResponse = self.client.post_json("embed", &EmbedRequest { texts: batch }).await?;
            check_count(batch.len(), response.embeddings.len())?;
            vectors.extend(response.embeddings);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
pub(crate) struct Point<'a> {
    pub(crate) id: &'a str,
    pub(crate) vector: &'a [f32],
    pub(crate) payload: PointPayload<'a>,
}

#[derive(Serialize)]
pub(crate) struct PointPayload<'a> {
    pub(crate) document_id: &'a str,
    pub(crate) chunk_index: usize,
    pub(crate) company_ref: Option<&'a str>,
    pub(crate) text: &'a str,
}

pub(crate) fn points(chunks: &[EmbeddedChunk]) -> Vec<Point<'_>> {
    chunks
        .iter()
        .map(|c| Point {
            id: &c.chunk.id,
            vector: &c.embedding,
            payload: PointPayload {
                document_id: &c.chunk.document_id,
                chunk_index: c.chunk.index,
                company_ref: c.company_ref.as_deref(),
                text: &c.chunk.text,
            },
        })
        .collect()
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: Vec<Point<'a>>,
}

#[derive(Deserialize)]
struct Ack {}

/// `POST /points/upsert`, idempotent on point id.
#[derive(Debug, Clone)]
pub struct HttpVectorIndex {
    client: ServiceClient,
}

impl HttpVectorIndex {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<(), CapabilityError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let _: Ack = self.client.post_json("points/upsert", &UpsertRequest { points: points(chunks) }).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct CrawlResponse {
    items: Vec<CrawledItem>,
}

/// `POST /crawl` for a site; returns the items found.
#[derive(Debug, Clone)]
pub struct HttpCrawler {
    client: ServiceClient,
}

impl HttpCrawler {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Crawler for HttpCrawler {
    async fn crawl(&self, site_url: &str) -> Result<Vec<CrawledItem>, CapabilityError> {
        let response: CrawlResponse = self.client.post_json("crawl", &CrawlRequest { url: site_url }).await?;
        Ok(response.items)
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
