// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document pipeline: download, extract, chunk, embed, persist.
//!
//! Chunks are keyed by the source URL, their index and a text prefix, so a
//! re-run of the same document upserts the same rows and vector points.

use super::{HandlerError, Pipelines, ProgressSink};
use sj_adapters::{CapabilityError, Crawler, DocumentSource, Embedder, Extractor, VectorIndex};
use sj_core::{retry_transient, EmbeddedChunk, Job, JobCounters};
use sj_storage::RecordStore;
use tracing::{debug, info};

impl<R, F, X, E, V, C> Pipelines<R, F, X, E, V, C>
where
    R: RecordStore,
    F: DocumentSource,
    X: Extractor,
    E: Embedder,
    V: VectorIndex,
    C: Crawler,
{
    pub(super) async fn run_document(
        &self,
        job: &Job,
        progress: &dyn ProgressSink,
    ) -> Result<JobCounters, HandlerError> {
        let url = job.source_url.as_str();

        progress.report("downloading").await;
        let bytes = retry_transient(&self.retry, "download", || self.source.fetch(url))
            .await
            .map_err(HandlerError::Download)?;
        debug!(job_id = %job.id, bytes = bytes.len(), "downloaded document");

        progress.report(&format!("extracting text from {} bytes", bytes.len())).await;
        let extracted = retry_transient(&self.retry, "extract", || self.extractor.extract(&bytes, url))
            .await
            .map_err(HandlerError::Extraction)?;
        drop(bytes);

        let chunks = self.chunker.chunk(url, &extracted.text);
        if chunks.is_empty() {
            return Err(HandlerError::EmptyDocument { pages: extracted.page_count });
        }

        progress
            .report(&format!("embedding {} chunks from {} pages", chunks.len(), extracted.page_count))
            .await;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = retry_transient(&self.retry, "embed", || self.embedder.embed(&texts))
            .await
            .map_err(HandlerError::Embedding)?;
        if vectors.len() != chunks.len() {
            return Err(HandlerError::Embedding(CapabilityError::Mismatch {
                service: "embedder",
                expected: chunks.len(),
                got: vectors.len(),
            }));
        }

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, company_ref: job.company_ref.clone(), embedding })
            .collect();

        progress.report(&format!("persisting {} chunks", embedded.len())).await;
        retry_transient(&self.retry, "upsert chunks", || self.records.upsert_chunks(&embedded))
            .await
            .map_err(|e| HandlerError::store("chunk table", e))?;
        retry_transient(&self.retry, "upsert vectors", || self.index.upsert(&embedded))
            .await
            .map_err(|e| HandlerError::Persistence { target: "vector index", detail: e.to_string() })?;

        info!(
            job_id = %job.id,
            chunks = embedded.len(),
            pages = extracted.page_count,
            "document processed"
        );
        Ok(JobCounters { items_produced: embedded.len() as u64, units_processed: extracted.page_count.into() })
    }
}
