// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker.

use sj_core::{parse_duration, parse_kinds, Chunker, JobKind};
use std::time::Duration;
use thiserror::Error;

/// Invalid or missing worker configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

/// Worker settings, read once at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Job kinds this worker claims
    pub kinds: Vec<JobKind>,
    pub poll_interval: Duration,
    pub idle_timeout: Duration,
    pub allowed_domains: Vec<String>,
    pub max_download_bytes: u64,
    pub extractor_url: String,
    pub embedder_url: String,
    pub vector_url: String,
    pub crawler_url: String,
    pub embedder_api_key: Option<String>,
    pub vector_api_key: Option<String>,
    pub service_timeout: Duration,
    pub embed_batch: usize,
    pub chunker: Chunker,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let kinds = match get("SJ_WORKER_JOB_TYPES") {
            Some(list) => parse_kinds(&list).map_err(|e| ConfigError::Invalid {
                var: "SJ_WORKER_JOB_TYPES",
                value: list.clone(),
                reason: e.to_string(),
            })?,
            None => JobKind::ALL.to_vec(),
        };
        if kinds.is_empty() {
            return Err(ConfigError::Invalid {
                var: "SJ_WORKER_JOB_TYPES",
                value: String::new(),
                reason: "no job types listed".to_string(),
            });
        }
        let url = |var: &'static str, port: u16| get(var).unwrap_or_else(|| format!("http://127.0.0.1:{port}"));

        Ok(Self {
            database_url,
            kinds,
            poll_interval: duration(&get, "SJ_WORKER_POLL_INTERVAL", Duration::from_secs(5))?,
            idle_timeout: duration(&get, "SJ_WORKER_IDLE_TIMEOUT", Duration::from_secs(600))?,
            allowed_domains: get("SJ_ALLOWED_DOMAINS")
                .map(|list| {
                    list.split(',').map(|d| d.trim().to_ascii_lowercase()).filter(|d| !d.is_empty()).collect()
                })
                .unwrap_or_default(),
            max_download_bytes: number(&get, "SJ_MAX_DOWNLOAD_BYTES", 100 * 1024 * 1024)?,
            extractor_url: url("SJ_EXTRACTOR_URL", 8001),
            embedder_url: url("SJ_EMBEDDER_URL", 8002),
            vector_url: url("SJ_VECTOR_URL", 6333),
            crawler_url: url("SJ_CRAWLER_URL", 8003),
            embedder_api_key: get("SJ_EMBEDDER_API_KEY"),
            vector_api_key: get("SJ_VECTOR_API_KEY"),
            service_timeout: duration(&get, "SJ_SERVICE_TIMEOUT", Duration::from_secs(300))?,
            embed_batch: number(&get, "SJ_EMBED_BATCH", 64)?,
            chunker: Chunker::new(number(&get, "SJ_CHUNK_WORDS", 400)?, number(&get, "SJ_CHUNK_OVERLAP", 50)?),
        })
    }
}

fn duration(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match get(var) {
        Some(value) => {
            parse_duration(&value).map_err(|reason| ConfigError::Invalid { var, value, reason })
        }
        None => Ok(default),
    }
}

fn number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid { var, reason: e.to_string(), value }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
