// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed store.
//!
//! The claim is one statement: a `FOR UPDATE SKIP LOCKED` subselect picks the
//! oldest eligible row that no other session is claiming, and the outer
//! `UPDATE` flips it to `processing` before the row lock is released at
//! commit. No lock is held while the job runs. Later updates are guarded by
//! `status = 'processing' AND claimed_by = $worker`, so a reaped job cannot
//! be completed by the worker that lost it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sj_core::{EmbeddedChunk, Job, JobCounters, JobId, JobKind, NewJob, WorkerId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::schema::SCHEMA;
use crate::store::{stuck_message, IngestRecord, JobStore, QueueDepth, RecordStore, StoreError};

const JOB_COLUMNS: &str = "id, job_type, status, source_url, company_ref, created_at, started_at, \
     completed_at, progress_message, error_message, items_produced, units_processed, duration_ms, claimed_by";

pub(crate) const CLAIM_SQL: &str = "UPDATE jobs
    SET status = 'processing', started_at = now(), claimed_by = $1, progress_message = 'claimed'
    WHERE id = (
        SELECT id FROM jobs
        WHERE status = 'pending' AND job_type = ANY($2)
        ORDER BY created_at, id
        LIMIT 1
        FOR UPDATE SKIP LOCKED
    )
    RETURNING ";

const DURATION_EXPR: &str = "(EXTRACT(EPOCH FROM (now() - started_at)) * 1000)::BIGINT";

pub(crate) const HELD: &str = "id = $1 AND status = 'processing' AND claimed_by = $2";

/// Postgres job queue and record store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!(statements = SCHEMA.len(), "job queue schema applied");
        Ok(())
    }
}

/// A guarded update that matched nothing means the caller lost the job.
fn held(rows_affected: u64, id: &JobId, worker: &WorkerId) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::NotHeld { id: id.clone(), worker: worker.clone() });
    }
    Ok(())
}

fn kind_names(kinds: &[JobKind]) -> Vec<String> {
    kinds.iter().map(|k| k.as_str().to_string()).collect()
}

pub(crate) fn to_ms(at: DateTime<Utc>) -> u64 {
    at.timestamp_millis().max(0) as u64
}

fn to_u64(v: i64) -> u64 {
    v.max(0) as u64
}

fn job_from_row(row: &PgRow) -> Result<Job, StoreError> {
    let decode = |e: String| StoreError::Decode(e);
    let kind: String = row.try_get("job_type")?;
    let status: String = row.try_get("status")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let started_at: Option<DateTime<Utc>> = row.try_get("started_at")?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at")?;
    let claimed_by: Option<String> = row.try_get("claimed_by")?;
    let duration_ms: Option<i64> = row.try_get("duration_ms")?;
    Ok(Job {
        id: JobId::from_string(row.try_get::<String, _>("id")?),
        kind: kind.parse().map_err(|e: sj_core::UnknownJobKind| decode(e.to_string()))?,
        status: status.parse().map_err(|e: sj_core::job::UnknownJobStatus| decode(e.to_string()))?,
        source_url: row.try_get("source_url")?,
        company_ref: row.try_get("company_ref")?,
        created_at_ms: to_ms(created_at),
        started_at_ms: started_at.map(to_ms),
        completed_at_ms: completed_at.map(to_ms),
        progress_message: row.try_get("progress_message")?,
        error_message: row.try_get("error_message")?,
        counters: JobCounters {
            items_produced: to_u64(row.try_get("items_produced")?),
            units_processed: to_u64(row.try_get("units_processed")?),
        },
        duration_ms: duration_ms.map(to_u64),
        claimed_by: claimed_by.map(WorkerId::new),
    })
}

#[async_trait]
impl JobStore for PgStore {
    async fn enqueue(&self, job: NewJob) -> Result<Job, StoreError> {
        let sql = format!(
            "INSERT INTO jobs (id, job_type, source_url, company_ref) VALUES ($1, $2, $3, $4) RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(job.id.as_str())
            .bind(job.kind.as_str())
            .bind(&job.source_url)
            .bind(&job.company_ref)
            .fetch_one(&self.pool)
            .await?;
        job_from_row(&row)
    }

    async fn claim_next(&self, worker: &WorkerId, kinds: &[JobKind]) -> Result<Option<Job>, StoreError> {
        if kinds.is_empty() {
            return Ok(None);
        }
        let sql = format!("{CLAIM_SQL}{JOB_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(worker.as_str())
            .bind(kind_names(kinds))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn set_progress(&self, id: &JobId, worker: &WorkerId, message: &str) -> Result<(), StoreError> {
        let sql = format!("UPDATE jobs SET progress_message = $3 WHERE {HELD}");
        let result = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(worker.as_str())
            .bind(message)
            .execute(&self.pool)
            .await?;
        held(result.rows_affected(), id, worker)
    }

    async fn complete(&self, id: &JobId, worker: &WorkerId, counters: JobCounters) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE jobs SET status = 'completed', completed_at = now(), duration_ms = {DURATION_EXPR}, \
             items_produced = $3, units_processed = $4, progress_message = 'completed' WHERE {HELD}"
        );
        let result = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(worker.as_str())
            .bind(counters.items_produced as i64)
            .bind(counters.units_processed as i64)
            .execute(&self.pool)
            .await?;
        held(result.rows_affected(), id, worker)
    }

    async fn fail(&self, id: &JobId, worker: &WorkerId, error: &str) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE jobs SET status = 'failed', completed_at = now(), duration_ms = {DURATION_EXPR}, \
             error_message = $3 WHERE {HELD}"
        );
        let result = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(worker.as_str())
            .bind(error)
            .execute(&self.pool)
            .await?;
        held(result.rows_affected(), id, worker)
    }

    async fn reap_stuck(&self, threshold: Duration) -> Result<Vec<JobId>, StoreError> {
        let sql = format!(
            "UPDATE jobs SET status = 'failed', completed_at = now(), duration_ms = {DURATION_EXPR}, \
             error_message = $2 \
             WHERE status = 'processing' AND started_at < now() - make_interval(secs => $1) \
             RETURNING id"
        );
        let rows = sqlx::query(&sql)
            .bind(threshold.as_secs_f64())
            .bind(stuck_message(threshold))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| Ok(JobId::from_string(r.try_get::<String, _>("id")?))).collect()
    }

    async fn queue_depth(&self, kinds: &[JobKind]) -> Result<QueueDepth, StoreError> {
        let row = sqlx::query(
            "SELECT count(*) FILTER (WHERE status = 'pending') AS pending, \
             count(*) FILTER (WHERE status = 'processing') AS processing \
             FROM jobs WHERE job_type = ANY($1)",
        )
        .bind(kind_names(kinds))
        .fetch_one(&self.pool)
        .await?;
        Ok(QueueDepth {
            pending: to_u64(row.try_get("pending")?),
            processing: to_u64(row.try_get("processing")?),
        })
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query(&sql).bind(id.as_str()).fetch_optional(&self.pool).await?;
        row.as_ref().map(job_from_row).transpose()
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn upsert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        for item in chunks {
            let chunk = &item.chunk;
            sqlx::query(
                "INSERT INTO document_chunks (id, document_id, company_ref, chunk_index, content, word_count) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET content = EXCLUDED.content, \
                 word_count = EXCLUDED.word_count, company_ref = EXCLUDED.company_ref, updated_at = now()",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&item.company_ref)
            .bind(chunk.index as i32)
            .bind(&chunk.text)
            .bind(chunk.word_count as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(chunks.len() as u64)
    }

    async fn upsert_records(&self, records: &[IngestRecord]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO ingested_items (source_url, company_ref, title, published_on, body) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (source_url) DO UPDATE SET title = EXCLUDED.title, \
                 published_on = EXCLUDED.published_on, body = EXCLUDED.body, \
                 company_ref = EXCLUDED.company_ref, updated_at = now()",
            )
            .bind(&record.source_url)
            .bind(&record.company_ref)
            .bind(&record.title)
            .bind(record.published_on)
            .bind(&record.body)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len() as u64)
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
