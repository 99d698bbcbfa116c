// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guarded HTTP fetcher.

use super::{collect_capped, DocumentSource, FetchError, Resolver, SystemResolver, UrlGuard, ValidatedTarget};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::Url;
use std::time::Duration;

const USER_AGENT: &str = concat!("spotjobs-worker/", env!("CARGO_PKG_VERSION"));

/// Fetches documents through the [`UrlGuard`], following redirects by hand
/// so each hop is validated and pinned like the first.
#[derive(Clone)]
pub struct SafeFetcher<R: Resolver = SystemResolver> {
    guard: UrlGuard,
    resolver: R,
    max_bytes: u64,
    max_redirects: usize,
    timeout: Duration,
}

impl SafeFetcher<SystemResolver> {
    pub fn new(guard: UrlGuard, max_bytes: u64) -> Self {
        Self::with_resolver(guard, max_bytes, SystemResolver)
    }
}

impl<R: Resolver> SafeFetcher<R> {
    pub fn with_resolver(guard: UrlGuard, max_bytes: u64, resolver: R) -> Self {
        Self { guard, resolver, max_bytes, max_redirects: 5, timeout: Duration::from_secs(120) }
    }

    sj_core::setters! {
        set { max_redirects: usize, timeout: Duration }
    }

    /// A client that cannot follow redirects and may only connect to the
    /// addresses the guard checked.
    fn client_for(&self, target: &ValidatedTarget) -> Result<reqwest::Client, FetchError> {
        let mut builder = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT);
        if !target.addrs.is_empty() {
            builder = builder.resolve_to_addrs(&target.host, &target.addrs);
        }
        builder.build().map_err(|e| FetchError::Http(format!("failed to create HTTP client: {e}")))
    }
}

/// Resolve a `Location` header against the URL that returned it.
pub(crate) fn redirect_target(current: &Url, location: Option<&str>) -> Result<Url, FetchError> {
    let location = location.ok_or_else(|| FetchError::InvalidUrl {
        url: current.to_string(),
        reason: "redirect without Location".to_string(),
    })?;
    current
        .join(location)
        .map_err(|e| FetchError::InvalidUrl { url: location.to_string(), reason: e.to_string() })
}

#[async_trait]
impl<R: Resolver> DocumentSource for SafeFetcher<R> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut current =
            Url::parse(url).map_err(|e| FetchError::InvalidUrl { url: url.to_string(), reason: e.to_string() })?;

        for hop in 0..=self.max_redirects {
            let target = match self.guard.validate(&current, &self.resolver).await {
                Ok(target) => target,
                Err(e) => {
                    if e.is_security() {
                        tracing::warn!(security = true, url = %current, hop, error = %e, "download rejected");
                    }
                    return Err(e);
                }
            };
            let client = self.client_for(&target)?;
            let response = client
                .get(target.url.clone())
                .send()
                .await
                .map_err(|e| FetchError::Http(e.to_string()))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response.headers().get(LOCATION).and_then(|v| v.to_str().ok());
                let next = redirect_target(&current, location)?;
                tracing::debug!(from = %current, to = %next, hop, "following redirect");
                current = next;
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Status { url: current.to_string(), status: status.as_u16() });
            }

            let declared = response.content_length();
            return match collect_capped(response.bytes_stream(), declared, self.max_bytes).await {
                Ok(body) => {
                    tracing::debug!(url = %current, bytes = body.len(), "download complete");
                    Ok(body)
                }
                Err(e) => {
                    if e.is_security() {
                        tracing::warn!(security = true, url = %current, limit = self.max_bytes, "download over size cap");
                    }
                    Err(e)
                }
            };
        }
        let err = FetchError::TooManyRedirects(self.max_redirects);
        tracing::warn!(security = true, url, error = %err, "download rejected");
        Err(err)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
