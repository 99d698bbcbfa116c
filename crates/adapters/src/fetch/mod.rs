// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Download safety layer.
//!
//! Every URL (and every redirect target) passes [`UrlGuard`] before a socket
//! is opened: scheme check, metadata and internal-address rejection on both
//! the literal host and its resolved addresses, then the domain allow-list
//! or the https document-path fallback. The connection is pinned to the
//! addresses that were checked. Bodies stream through a hard byte cap.

mod capped;
mod client;
mod guard;

pub use capped::collect_capped;
pub use client::SafeFetcher;
pub use guard::{is_blocked_ip, Resolver, SystemResolver, UrlGuard, ValidatedTarget};

use async_trait::async_trait;
use sj_core::Transient;
use thiserror::Error;

/// Why a URL was refused before any request was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Scheme(String),
    MissingHost,
    MetadataHost(String),
    /// Literal or resolved address in a loopback, link-local or private range
    InternalAddress(std::net::IpAddr),
    /// Host not allow-listed and the URL is not an https document path
    NotAllowed(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Scheme(s) => write!(f, "scheme {s:?} not allowed"),
            Rejection::MissingHost => write!(f, "URL has no host"),
            Rejection::MetadataHost(h) => write!(f, "cloud metadata host {h}"),
            Rejection::InternalAddress(ip) => write!(f, "internal address {ip}"),
            Rejection::NotAllowed(h) => write!(f, "host {h} is not allow-listed"),
        }
    }
}

/// Errors from fetching a document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("URL rejected ({reason}): {url}")]
    Rejected { url: String, reason: Rejection },
    #[error("download exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("too many redirects (max {0})")]
    TooManyRedirects(usize),
    #[error("could not resolve {host}: {detail}")]
    Resolve { host: String, detail: String },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("request failed: {0}")]
    Http(String),
}

impl FetchError {
    /// Safety-layer refusals: terminal for the job and logged apart from
    /// infrastructure failures.
    pub fn is_security(&self) -> bool {
        matches!(self, FetchError::Rejected { .. } | FetchError::TooLarge { .. } | FetchError::TooManyRedirects(_))
    }
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(_) | FetchError::Resolve { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Fetches a document's bytes by URL.
#[async_trait]
pub trait DocumentSource: Clone + Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeResolver, FakeSource};
