// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sj-adapters: Adapters for external I/O (cloud provider, bootstrap channel,
//! document downloads and capability services)

pub mod bootstrap;
pub mod credential;
pub mod fetch;
pub mod provider;
pub mod services;

pub use bootstrap::{BootstrapChannel, BootstrapError, CommandOutput, SshChannel};
pub use credential::{CredentialError, LocalSecretFile, WorkerCredentials, WORKER_VARS};
pub use fetch::{DocumentSource, FetchError, Rejection, SafeFetcher, SystemResolver, UrlGuard};
pub use provider::{
    BootScript, DigitalOceanProvider, NodeLayout, NodeProvider, ProviderError, DEFAULT_API_URL,
};
pub use services::{
    CapabilityError, CrawledItem, Crawler, Embedder, Extracted, Extractor, HttpCrawler, HttpEmbedder,
    HttpExtractor, HttpVectorIndex, ServiceClient, VectorIndex,
};

#[cfg(any(test, feature = "test-support"))]
pub use bootstrap::{ChannelCall, FakeChannel};
#[cfg(any(test, feature = "test-support"))]
pub use fetch::{FakeResolver, FakeSource};
#[cfg(any(test, feature = "test-support"))]
pub use provider::{FakeNodeProvider, ProviderCall};
#[cfg(any(test, feature = "test-support"))]
pub use services::{FakeCrawler, FakeEmbedder, FakeExtractor, FakeVectorIndex};
