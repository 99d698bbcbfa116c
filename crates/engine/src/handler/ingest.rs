// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion pipeline: crawl a site, normalize dated items, upsert by URL.

use super::{HandlerError, Pipelines, ProgressSink};
use chrono::{DateTime, NaiveDate};
use sj_adapters::{Crawler, DocumentSource, Embedder, Extractor, VectorIndex};
use sj_core::{retry_transient, Job, JobCounters};
use sj_storage::{IngestRecord, RecordStore};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Date formats seen on crawled pages, tried in order after RFC 3339.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%B %d, %Y"];

/// Parse a date as printed on a page. `None` when no format matches.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS.iter().find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
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
    pub(super) async fn run_ingestion(
        &self,
        job: &Job,
        progress: &dyn ProgressSink,
    ) -> Result<JobCounters, HandlerError> {
        let site = job.source_url.as_str();

        progress.report("crawling").await;
        let items = retry_transient(&self.retry, "crawl", || self.crawler.crawl(site))
            .await
            .map_err(HandlerError::Crawl)?;
        let crawled = items.len();

        // Keyed by URL; a page listed twice keeps its last occurrence
        let mut records = BTreeMap::new();
        let mut undated = 0u64;
        for item in items {
            let Some(published_on) = item.date.as_deref().and_then(normalize_date) else {
                debug!(job_id = %job.id, url = %item.url, date = ?item.date, "skipping undated item");
                undated += 1;
                continue;
            };
            records.insert(
                item.url.clone(),
                IngestRecord {
                    source_url: item.url,
                    company_ref: job.company_ref.clone(),
                    title: item.title.trim().to_string(),
                    published_on,
                    body: item.body,
                },
            );
        }
        let records: Vec<IngestRecord> = records.into_values().collect();

        progress.report(&format!("persisting {} of {} items", records.len(), crawled)).await;
        if !records.is_empty() {
            retry_transient(&self.retry, "upsert records", || self.records.upsert_records(&records))
                .await
                .map_err(|e| HandlerError::store("ingested items", e))?;
        }

        info!(job_id = %job.id, crawled, stored = records.len(), undated, "site ingested");
        Ok(JobCounters { items_produced: records.len() as u64, units_processed: crawled as u64 })
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
