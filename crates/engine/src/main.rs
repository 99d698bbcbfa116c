// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sj-worker: runs on a provisioned node until the queue stays empty.

use anyhow::Context;
use sj_adapters::{
    HttpCrawler, HttpEmbedder, HttpExtractor, HttpVectorIndex, SafeFetcher, ServiceClient, UrlGuard,
};
use sj_core::{shutdown_token, SystemClock, WorkerId};
use sj_engine::{Pipelines, WorkerConfig, WorkerExit, WorkerLoop};
use sj_storage::PgStore;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = std::env::var("SJ_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = WorkerConfig::from_env()?;

    let store = PgStore::connect(&config.database_url, 4).await.context("connecting to job store")?;
    store.migrate().await.context("applying schema")?;

    let service = |name: &'static str, url: &str, key: &Option<String>| {
        ServiceClient::new(name, url, key.clone(), config.service_timeout)
    };
    let fetcher = SafeFetcher::new(UrlGuard::new(config.allowed_domains.clone()), config.max_download_bytes)
        .timeout(config.service_timeout);
    let pipelines = Pipelines::new(
        store.clone(),
        fetcher,
        HttpExtractor::new(service("extractor", &config.extractor_url, &None)?),
        HttpEmbedder::new(service("embedder", &config.embedder_url, &config.embedder_api_key)?, config.embed_batch),
        HttpVectorIndex::new(service("vector index", &config.vector_url, &config.vector_api_key)?),
        HttpCrawler::new(service("crawler", &config.crawler_url, &None)?),
    )
    .chunker(config.chunker);

    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string());
    let worker = WorkerLoop::new(store, pipelines, SystemClock, WorkerId::for_process(&host), config.kinds.clone())
        .poll_interval(config.poll_interval)
        .idle_timeout(config.idle_timeout);

    let shutdown = shutdown_token().context("installing signal handlers")?;
    match worker.run(shutdown).await? {
        WorkerExit::Idle => tracing::info!("queue idle, worker exiting"),
        WorkerExit::Shutdown => tracing::info!("worker stopped on signal"),
    }
    Ok(())
}
