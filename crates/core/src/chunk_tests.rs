// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn chunk_id_is_stable_and_hex() {
    let a = chunk_id("job-1", 0, "hello world");
    let b = chunk_id("job-1", 0, "hello world");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[yare::parameterized(
    other_document = { "job-2", 0, "hello world" },
    other_index    = { "job-1", 1, "hello world" },
    other_text     = { "job-1", 0, "goodbye world" },
)]
fn chunk_id_changes_with_each_input(doc: &str, index: usize, text: &str) {
    assert_ne!(chunk_id("job-1", 0, "hello world"), chunk_id(doc, index, text));
}

#[test]
fn chunk_id_only_reads_text_prefix() {
    let base = "x".repeat(CHUNK_ID_PREFIX_CHARS);
    assert_eq!(chunk_id("d", 0, &format!("{base}tail-a")), chunk_id("d", 0, &format!("{base}tail-b")));
}

#[test]
fn empty_text_has_no_chunks() {
    assert!(Chunker::default().chunk("d", "  \n\t ").is_empty());
}

#[test]
fn short_text_is_single_chunk() {
    let chunks = Chunker::new(10, 2).chunk("d", "one two three");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "one two three");
    assert_eq!(chunks[0].word_count, 3);
    assert_eq!(chunks[0].index, 0);
}

#[test]
fn windows_overlap_and_cover_all_words() {
    let chunks = Chunker::new(10, 3).chunk("d", &words(25));
    // starts at 0, 7, 14, 21
    assert_eq!(chunks.len(), 4);
    assert!(chunks[0].text.starts_with("w0 "));
    assert!(chunks[1].text.starts_with("w7 "));
    assert!(chunks[3].text.ends_with("w24"));
    assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

#[test]
fn overlap_is_clamped_below_window() {
    let chunker = Chunker::new(5, 9);
    assert_eq!(chunker.overlap, 4);
    assert_eq!(chunker.chunk("d", &words(7)).len(), 3);
}

#[test]
fn rechunking_yields_identical_ids() {
    let text = words(1000);
    let a: Vec<_> = Chunker::default().chunk("job-9", &text).into_iter().map(|c| c.id).collect();
    let b: Vec<_> = Chunker::default().chunk("job-9", &text).into_iter().map(|c| c.id).collect();
    assert_eq!(a, b);
}
