// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::handler::tests::{Harness, RecordingProgress};
use crate::handler::JobHandler;
use sj_adapters::CrawledItem;
use sj_core::JobKind;
use yare::parameterized;

const SITE: &str = "https://acme.example.com/news";

fn item(url: &str, date: Option<&str>) -> CrawledItem {
    CrawledItem {
        url: url.to_string(),
        title: format!("  Title of {url} "),
        date: date.map(String::from),
        body: "body".to_string(),
    }
}

fn ingestion_job() -> Job {
    Job::builder().kind(JobKind::Ingestion).source_url(SITE).company_ref("acme").build()
}

fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

#[parameterized(
    rfc3339 = { "2024-03-05T10:30:00Z", ymd(2024, 3, 5) },
    rfc3339_offset = { "2024-03-05T23:30:00-05:00", ymd(2024, 3, 5) },
    iso_date = { "2024-03-05", ymd(2024, 3, 5) },
    day_first = { "05/03/2024", ymd(2024, 3, 5) },
    month_name = { "March 5, 2024", ymd(2024, 3, 5) },
    padded = { "  2023-12-25 ", ymd(2023, 12, 25) },
    impossible = { "31/02/2024", None },
    words = { "last Tuesday", None },
    empty = { "", None },
)]
fn dates_are_normalized(raw: &str, expected: Option<NaiveDate>) {
    assert_eq!(normalize_date(raw), expected);
}

#[tokio::test]
async fn dated_items_are_stored_and_undated_skipped() {
    let h = Harness::new();
    h.crawler.serve(
        SITE,
        vec![
            item("https://acme.example.com/news/1", Some("2024-01-10")),
            item("https://acme.example.com/news/2", None),
            item("https://acme.example.com/news/3", Some("sometime")),
            item("https://acme.example.com/news/4", Some("March 5, 2024")),
        ],
    );
    let progress = RecordingProgress::default();

    let counters = h.pipelines().handle(&ingestion_job(), &progress).await.unwrap();

    assert_eq!(counters, JobCounters { items_produced: 2, units_processed: 4 });
    let records = h.store.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.company_ref.as_deref() == Some("acme")));
    assert!(records.iter().any(|r| r.title == "Title of https://acme.example.com/news/1"));
    assert_eq!(progress.messages(), vec!["crawling".to_string(), "persisting 2 of 4 items".to_string()]);
}

#[tokio::test]
async fn reingesting_upserts_by_url() {
    let h = Harness::new();
    h.crawler.serve(SITE, vec![item("https://acme.example.com/news/1", Some("2024-01-10"))]);
    let pipelines = h.pipelines();
    pipelines.handle(&ingestion_job(), &RecordingProgress::default()).await.unwrap();

    h.crawler.serve(
        SITE,
        vec![
            item("https://acme.example.com/news/1", Some("2024-01-11")),
            item("https://acme.example.com/news/1", Some("2024-01-12")),
        ],
    );
    let counters = pipelines.handle(&ingestion_job(), &RecordingProgress::default()).await.unwrap();

    assert_eq!(counters.items_produced, 1);
    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(Some(records[0].published_on), ymd(2024, 1, 12));
}

#[tokio::test]
async fn crawl_failure_is_reported_by_stage() {
    let h = Harness::new();
    h.crawler.fail_next(404);

    let err = h.pipelines().handle(&ingestion_job(), &RecordingProgress::default()).await.unwrap_err();

    assert!(err.to_string().starts_with("crawl failed:"), "{err}");
    assert!(h.store.records().is_empty());
}
