// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document chunks and the word-window chunker.
//!
//! A chunk's id is derived from its content so that re-running a document
//! job upserts the same rows instead of appending duplicates.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Characters of chunk text folded into the content id.
pub const CHUNK_ID_PREFIX_CHARS: usize = 64;

/// Content-derived chunk identifier: `sha256(document_id | index | text prefix)`.
pub fn chunk_id(document_id: &str, index: usize, text: &str) -> String {
    let prefix: String = text.chars().take(CHUNK_ID_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(b"|");
    hasher.update(index.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(prefix.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

/// A slice of extracted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

impl Chunk {
    pub fn new(document_id: &str, index: usize, text: String) -> Self {
        Self {
            id: chunk_id(document_id, index, &text),
            document_id: document_id.to_string(),
            index,
            word_count: text.split_whitespace().count(),
            text,
        }
    }
}

/// A chunk paired with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub company_ref: Option<String>,
    pub embedding: Vec<f32>,
}

/// Splits text into overlapping windows of whitespace-delimited words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    pub words: usize,
    pub overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { words: 400, overlap: 50 }
    }
}

impl Chunker {
    pub fn new(words: usize, overlap: usize) -> Self {
        let words = words.max(1);
        Self { words, overlap: overlap.min(words - 1) }
    }

    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        let step = self.words - self.overlap.min(self.words - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.words).min(words.len());
            chunks.push(Chunk::new(document_id, chunks.len(), words[start..end].join(" ")));
            if end == words.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
