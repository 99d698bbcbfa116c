// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tables owned by the job queue. Applied idempotently at startup.

pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS jobs (
        id               TEXT PRIMARY KEY,
        job_type         TEXT NOT NULL,
        status           TEXT NOT NULL DEFAULT 'pending'
                         CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
        source_url       TEXT NOT NULL,
        company_ref      TEXT,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        started_at       TIMESTAMPTZ,
        completed_at     TIMESTAMPTZ,
        progress_message TEXT,
        error_message    TEXT,
        items_produced   BIGINT NOT NULL DEFAULT 0,
        units_processed  BIGINT NOT NULL DEFAULT 0,
        duration_ms      BIGINT,
        claimed_by       TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS jobs_pending_idx ON jobs (job_type, created_at) WHERE status = 'pending'",
    "CREATE INDEX IF NOT EXISTS jobs_processing_idx ON jobs (started_at) WHERE status = 'processing'",
    r#"CREATE TABLE IF NOT EXISTS document_chunks (
        id          TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        company_ref TEXT,
        chunk_index INTEGER NOT NULL,
        content     TEXT NOT NULL,
        word_count  INTEGER NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ingested_items (
        source_url   TEXT PRIMARY KEY,
        company_ref  TEXT,
        title        TEXT NOT NULL,
        published_on DATE NOT NULL,
        body         TEXT NOT NULL,
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
];
