// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Size-capped body collection.

use super::FetchError;
use futures_util::{Stream, StreamExt};

/// Collect a byte stream, failing the moment it would exceed `limit`.
///
/// A declared length over the limit fails before the first chunk is read.
/// Nothing past the limit is buffered.
pub async fn collect_capped<S, B, E>(stream: S, declared_len: Option<u64>, limit: u64) -> Result<Vec<u8>, FetchError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    if declared_len.is_some_and(|len| len > limit) {
        return Err(FetchError::TooLarge { limit });
    }
    let mut body = Vec::with_capacity(declared_len.unwrap_or(0).min(limit) as usize);
    futures_util::pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Http(format!("body read failed: {e}")))?;
        let chunk = chunk.as_ref();
        if body.len() as u64 + chunk.len() as u64 > limit {
            return Err(FetchError::TooLarge { limit });
        }
        body.extend_from_slice(chunk);
    }
    Ok(body)
}

#[cfg(test)]
#[path = "capped_tests.rs"]
mod tests;
