// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_with_only_database_url() {
    let config = WorkerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/jobs")])).unwrap();
    assert_eq!(config.database_url, "postgres://db/jobs");
    assert_eq!(config.kinds, JobKind::ALL.to_vec());
    assert_eq!(config.poll_interval, Duration::from_secs(5));
    assert_eq!(config.idle_timeout, Duration::from_secs(600));
    assert_eq!(config.max_download_bytes, 104_857_600);
    assert!(config.allowed_domains.is_empty());
    assert_eq!(config.chunker, Chunker::new(400, 50));
    assert_eq!(config.embedder_api_key, None);
}

#[test]
fn database_url_is_required() {
    let err = WorkerConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
}

#[test]
fn overrides_are_parsed() {
    let config = WorkerConfig::from_lookup(lookup(&[
        ("DATABASE_URL", "postgres://db/jobs"),
        ("SJ_WORKER_JOB_TYPES", "document_report, ingestion"),
        ("SJ_WORKER_IDLE_TIMEOUT", "2m"),
        ("SJ_ALLOWED_DOMAINS", "Reports.Example.com, ,cdn.example.org"),
        ("SJ_MAX_DOWNLOAD_BYTES", "1024"),
        ("SJ_CHUNK_WORDS", "100"),
        ("SJ_CHUNK_OVERLAP", "10"),
    ]))
    .unwrap();
    assert_eq!(config.kinds, vec![JobKind::DocumentReport, JobKind::Ingestion]);
    assert_eq!(config.idle_timeout, Duration::from_secs(120));
    assert_eq!(config.allowed_domains, vec!["reports.example.com", "cdn.example.org"]);
    assert_eq!(config.max_download_bytes, 1024);
    assert_eq!(config.chunker, Chunker::new(100, 10));
}

#[yare::parameterized(
    bad_kind = { "SJ_WORKER_JOB_TYPES", "pdf" },
    empty_kinds = { "SJ_WORKER_JOB_TYPES", "," },
    bad_duration = { "SJ_WORKER_POLL_INTERVAL", "soon" },
    bad_number = { "SJ_MAX_DOWNLOAD_BYTES", "-1" },
)]
fn invalid_values_name_the_variable(var: &str, value: &str) {
    let err = WorkerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db"), (var, value)])).unwrap_err();
    assert!(err.to_string().contains(var), "{err}");
}

#[test]
#[serial]
fn from_env_reads_process_environment() {
    std::env::set_var("DATABASE_URL", "postgres://env/jobs");
    std::env::set_var("SJ_WORKER_POLL_INTERVAL", "250ms");
    let config = WorkerConfig::from_env();
    std::env::remove_var("DATABASE_URL");
    std::env::remove_var("SJ_WORKER_POLL_INTERVAL");

    let config = config.unwrap();
    assert_eq!(config.database_url, "postgres://env/jobs");
    assert_eq!(config.poll_interval, Duration::from_millis(250));
}

#[test]
fn every_setting_read_is_forwarded_to_the_node() {
    let requested = parking_lot::Mutex::new(Vec::new());
    WorkerConfig::from_lookup(|key| {
        requested.lock().push(key.to_string());
        (key == "DATABASE_URL").then(|| "postgres://db/jobs".to_string())
    })
    .unwrap();

    let requested = requested.into_inner();
    assert!(requested.iter().any(|k| k == "SJ_SERVICE_TIMEOUT"));
    for key in &requested {
        assert!(sj_adapters::WORKER_VARS.contains(&key.as_str()), "{key} is never pushed to the node");
    }
}
