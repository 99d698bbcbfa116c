// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{DocumentSource, FetchError, Resolver, UrlGuard};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Resolver answering from a fixed table.
#[derive(Clone, Default)]
pub struct FakeResolver {
    hosts: Arc<Mutex<HashMap<String, Vec<IpAddr>>>>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, host: &str, ips: &[&str]) -> Self {
        let ips = ips.iter().filter_map(|ip| ip.parse().ok()).collect();
        self.hosts.lock().insert(host.to_string(), ips);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
        self.lookups.lock().push(host.to_string());
        match self.hosts.lock().get(host) {
            Some(ips) => Ok(ips.iter().map(|ip| SocketAddr::new(*ip, port)).collect()),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such host")),
        }
    }
}

#[derive(Clone)]
enum Served {
    Bytes(Vec<u8>),
    TooLarge(u64),
    Status(u16),
}

struct FakeSourceState {
    documents: HashMap<String, Served>,
    fetched: Vec<String>,
}

/// Document source serving canned bodies.
///
/// With a guard, URLs are checked (without DNS) before lookup, so policy
/// rejections surface the same way they do from the real fetcher.
#[derive(Clone)]
pub struct FakeSource {
    guard: Option<UrlGuard>,
    inner: Arc<Mutex<FakeSourceState>>,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self { guard: None, inner: Arc::new(Mutex::new(FakeSourceState { documents: HashMap::new(), fetched: Vec::new() })) }
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guarded(guard: UrlGuard) -> Self {
        Self { guard: Some(guard), ..Self::default() }
    }

    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.inner.lock().documents.insert(url.to_string(), Served::Bytes(body.into()));
    }

    /// Serve `url` as a body that crosses a `limit`-byte cap.
    pub fn serve_oversized(&self, url: &str, limit: u64) {
        self.inner.lock().documents.insert(url.to_string(), Served::TooLarge(limit));
    }

    pub fn serve_status(&self, url: &str, status: u16) {
        self.inner.lock().documents.insert(url.to_string(), Served::Status(status));
    }

    /// URLs that passed the guard and were requested.
    pub fn fetched(&self) -> Vec<String> {
        self.inner.lock().fetched.clone()
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| FetchError::InvalidUrl { url: url.to_string(), reason: e.to_string() })?;
        if let Some(guard) = &self.guard {
            guard.check_static(&parsed).map_err(|reason| FetchError::Rejected { url: url.to_string(), reason })?;
        }
        let mut state = self.inner.lock();
        state.fetched.push(url.to_string());
        match state.documents.get(url).cloned() {
            Some(Served::Bytes(body)) => Ok(body),
            Some(Served::TooLarge(limit)) => Err(FetchError::TooLarge { limit }),
            Some(Served::Status(status)) => Err(FetchError::Status { url: url.to_string(), status }),
            None => Err(FetchError::Status { url: url.to_string(), status: 404 }),
        }
    }
}
