// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSRF guard.

use super::{FetchError, Rejection};
use async_trait::async_trait;
use reqwest::Url;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Hostnames of cloud instance metadata services.
const METADATA_HOSTS: &[&str] = &[
    "metadata",
    "metadata.google.internal",
    "metadata.goog",
    "metadata.azure.internal",
    "instance-data",
    "instance-data.ec2.internal",
];

/// Metadata endpoints outside the ranges [`is_blocked_ip`] already covers.
const METADATA_IPS: &[IpAddr] = &[
    IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)),
    IpAddr::V4(Ipv4Addr::new(100, 100, 100, 200)),
    IpAddr::V6(Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x0254)),
];

/// Extensions accepted by the https document-path fallback.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "rtf", "txt", "csv"];

/// Loopback, link-local, private, shared, unspecified, broadcast and multicast.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    if METADATA_IPS.contains(&ip) {
        return true;
    }
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_multicast()
                || a == 0
                // 100.64.0.0/10 carrier-grade NAT
                || (a == 100 && (64..128).contains(&b))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = embedded_ipv4(v6) {
                return is_blocked_ip(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// The IPv4 address carried by a mapped (`::ffff:0:0/96`), compatible
/// (`::/96`), NAT64 (`64:ff9b::/96`) or 6to4 (`2002::/16`) address.
fn embedded_ipv4(v6: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = v6.to_ipv4_mapped() {
        return Some(v4);
    }
    let seg = v6.segments();
    let join = |hi: u16, lo: u16| Ipv4Addr::new((hi >> 8) as u8, hi as u8, (lo >> 8) as u8, lo as u8);
    match seg {
        [0, 0, 0, 0, 0, 0, hi, lo] => Some(join(hi, lo)),
        [0x64, 0xff9b, 0, 0, 0, 0, hi, lo] => Some(join(hi, lo)),
        [0x2002, hi, lo, ..] => Some(join(hi, lo)),
        _ => None,
    }
}

/// DNS lookup, injectable for tests.
#[async_trait]
pub trait Resolver: Clone + Send + Sync + 'static {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
        Ok(tokio::net::lookup_host((host, port)).await?.collect())
    }
}

/// A URL that passed the guard, with the addresses it may connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTarget {
    pub url: Url,
    pub host: String,
    /// Empty when the host is an IP literal
    pub addrs: Vec<SocketAddr>,
}

/// URL policy for document downloads.
#[derive(Debug, Clone, Default)]
pub struct UrlGuard {
    allowed_domains: Vec<String>,
}

impl UrlGuard {
    pub fn new(allowed_domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.into().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    fn is_allow_listed(&self, host: &str) -> bool {
        self.allowed_domains.iter().any(|d| host == d || host.ends_with(&format!(".{d}")))
    }

    /// Checks that need no network: scheme, host shape, literal addresses,
    /// metadata names, allow-list or document-path fallback.
    pub fn check_static(&self, url: &Url) -> Result<(), Rejection> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(Rejection::Scheme(scheme.to_string()));
        }
        let Some(raw) = url.host_str().filter(|h| !h.is_empty()) else {
            return Err(Rejection::MissingHost);
        };
        let bare = raw.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return self.check_literal(url, ip);
        }
        let name = bare.trim_end_matches('.').to_ascii_lowercase();
        if METADATA_HOSTS.contains(&name.as_str()) {
            return Err(Rejection::MetadataHost(name));
        }
        if name == "localhost" || name.ends_with(".localhost") {
            return Err(Rejection::InternalAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        }
        if self.is_allow_listed(&name) || is_document_path(url) {
            return Ok(());
        }
        Err(Rejection::NotAllowed(name))
    }

    fn check_literal(&self, url: &Url, ip: IpAddr) -> Result<(), Rejection> {
        if is_blocked_ip(ip) {
            return Err(Rejection::InternalAddress(ip));
        }
        if self.is_allow_listed(&ip.to_string()) || is_document_path(url) {
            return Ok(());
        }
        Err(Rejection::NotAllowed(ip.to_string()))
    }

    /// Full validation: static checks, then every resolved address.
    pub async fn validate<R: Resolver>(&self, url: &Url, resolver: &R) -> Result<ValidatedTarget, FetchError> {
        let reject = |reason: Rejection| FetchError::Rejected { url: url.to_string(), reason };
        self.check_static(url).map_err(reject)?;

        let host = url.host_str().unwrap_or_default().trim_start_matches('[').trim_end_matches(']').to_string();
        if host.parse::<IpAddr>().is_ok() {
            return Ok(ValidatedTarget { url: url.clone(), host, addrs: Vec::new() });
        }

        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = resolver
            .resolve(&host, port)
            .await
            .map_err(|e| FetchError::Resolve { host: host.clone(), detail: e.to_string() })?;
        if addrs.is_empty() {
            return Err(FetchError::Resolve { host, detail: "no addresses".to_string() });
        }
        if let Some(bad) = addrs.iter().map(SocketAddr::ip).find(|ip| is_blocked_ip(*ip)) {
            return Err(reject(Rejection::InternalAddress(bad)));
        }
        Ok(ValidatedTarget { url: url.clone(), host, addrs })
    }
}

/// https URL whose path ends in a known document extension.
fn is_document_path(url: &Url) -> bool {
    if url.scheme() != "https" {
        return false;
    }
    let path = url.path().to_ascii_lowercase();
    path.rsplit_once('.').is_some_and(|(_, ext)| DOCUMENT_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
