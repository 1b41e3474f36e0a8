//! Book text chunking with configurable size and overlap.
//!
//! Splits raw book text into overlapping passages with deterministic
//! identifiers and chapter labels. Chunking is a pure function: identical
//! input always produces identical chunks, so index rebuilds are
//! reproducible when the source text is unchanged.

use crate::types::{ChapterBoundary, Chunk};
use libris_core::config::ChunkingSettings;
use libris_core::{AppError, AppResult};
use sha2::{Digest, Sha256};

/// How far back from the window end to look for a sentence boundary.
const SENTENCE_LOOKBACK: usize = 200;

/// Length of the truncated content digest, in hex characters.
const DIGEST_LEN: usize = 12;

/// Split a book's raw text into overlapping chunks.
///
/// `chapter_boundaries` must be ascending byte offsets into `raw_text`,
/// each on a UTF-8 character boundary. Passages are labeled with the chapter
/// whose boundary most recently precedes their start.
///
/// # Errors
/// * `AppError::EmptyInput` if `raw_text` is empty or whitespace-only
/// * `AppError::InvalidBoundary` if any boundary offset falls outside
///   `raw_text`, splits a UTF-8 character, or offsets are not ascending
pub fn chunk(
    book_id: &str,
    raw_text: &str,
    chapter_boundaries: &[ChapterBoundary],
    settings: &ChunkingSettings,
) -> AppResult<Vec<Chunk>> {
    if raw_text.trim().is_empty() {
        return Err(AppError::EmptyInput(format!(
            "book '{}' has no text to chunk",
            book_id
        )));
    }

    validate_boundaries(raw_text, chapter_boundaries)?;

    let chunk_size = settings.chunk_size;
    let overlap = settings.chunk_overlap;

    let mut chunks = Vec::new();
    let mut position = 0u32;
    let mut start = 0;

    while start < raw_text.len() {
        let mut end = (start + chunk_size).min(raw_text.len());
        while end > start && !raw_text.is_char_boundary(end) {
            end -= 1;
        }

        // A window smaller than the character at `start` would back off to
        // zero width and stall the loop. Extend forward instead so every
        // iteration consumes at least one character.
        if end == start {
            end = start + 1;
            while end < raw_text.len() && !raw_text.is_char_boundary(end) {
                end += 1;
            }
        }

        // Prefer ending at a sentence boundary so meaning does not straddle
        // the cut. Sentence punctuation is ASCII, so `i + 1` stays a char
        // boundary.
        if end < raw_text.len() {
            end = snap_to_sentence(raw_text, start, end);
        }

        let passage = raw_text[start..end].trim();

        if passage.len() >= settings.min_chunk_chars {
            chunks.push(Chunk {
                chunk_id: chunk_id(book_id, position),
                book_id: book_id.to_string(),
                text: passage.to_string(),
                chapter: chapter_for_offset(chapter_boundaries, start),
                position,
                digest: digest(passage),
                word_count: passage.split_whitespace().count() as u32,
            });
            position += 1;
        }

        if end >= raw_text.len() {
            break;
        }

        // Move forward, keeping `overlap` characters of context
        let mut next_start = if end > start + overlap {
            end - overlap
        } else {
            end
        };
        while next_start < raw_text.len() && !raw_text.is_char_boundary(next_start) {
            next_start += 1;
        }
        start = next_start;
    }

    tracing::debug!(
        "Chunked book '{}' into {} chunks (size: {}, overlap: {})",
        book_id,
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// Deterministic chunk identifier: a function of book and position only.
pub fn chunk_id(book_id: &str, position: u32) -> String {
    format!("{}:{:04}", book_id, position)
}

/// Truncated SHA-256 hex digest of a passage.
fn digest(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    let hex: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..DIGEST_LEN].to_string()
}

/// Walk back from `end` looking for sentence-ending punctuation or a blank
/// line within the lookback window. Returns the adjusted end offset.
fn snap_to_sentence(text: &str, start: usize, end: usize) -> usize {
    let search_start = end.saturating_sub(SENTENCE_LOOKBACK).max(start + 1);
    let bytes = text.as_bytes();

    for i in (search_start..end).rev() {
        match bytes[i] {
            b'.' | b'!' | b'?' => return i + 1,
            b'\n' if i > 0 && bytes[i - 1] == b'\n' => return i + 1,
            _ => {}
        }
    }

    end
}

/// The chapter whose boundary most recently precedes `offset`, if any.
fn chapter_for_offset(boundaries: &[ChapterBoundary], offset: usize) -> Option<String> {
    boundaries
        .iter()
        .take_while(|b| b.offset <= offset)
        .last()
        .map(|b| b.title.clone())
}

fn validate_boundaries(raw_text: &str, boundaries: &[ChapterBoundary]) -> AppResult<()> {
    let mut previous: Option<usize> = None;

    for boundary in boundaries {
        if boundary.offset > raw_text.len() {
            return Err(AppError::InvalidBoundary(format!(
                "chapter '{}' starts at offset {} but text is {} bytes",
                boundary.title,
                boundary.offset,
                raw_text.len()
            )));
        }

        if !raw_text.is_char_boundary(boundary.offset) {
            return Err(AppError::InvalidBoundary(format!(
                "chapter '{}' offset {} splits a UTF-8 character",
                boundary.title, boundary.offset
            )));
        }

        if let Some(prev) = previous {
            if boundary.offset <= prev {
                return Err(AppError::InvalidBoundary(format!(
                    "chapter '{}' offset {} is not ascending (previous: {})",
                    boundary.title, boundary.offset, prev
                )));
            }
        }
        previous = Some(boundary.offset);
    }

    Ok(())
}

/// Detect chapter boundaries from common heading patterns.
///
/// Recognizes "Chapter N ..." lines and markdown headings. Books without
/// recognizable headings simply get no chapter labels; detection is a
/// convenience for ingest, not a correctness requirement.
pub fn detect_chapter_boundaries(raw_text: &str) -> Vec<ChapterBoundary> {
    let mut boundaries = Vec::new();
    let mut offset = 0;

    for line in raw_text.split_inclusive('\n') {
        let trimmed = line.trim();

        if let Some(title) = heading_title(trimmed) {
            boundaries.push(ChapterBoundary { offset, title });
        }

        offset += line.len();
    }

    boundaries
}

/// Extract a chapter title from a heading-like line, if it is one.
fn heading_title(line: &str) -> Option<String> {
    // Markdown heading
    if let Some(rest) = line.strip_prefix('#') {
        let title = rest.trim_start_matches('#').trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
        return None;
    }

    // "Chapter N" / "CHAPTER N" headings
    let lower = line.to_lowercase();
    if let Some(rest) = lower.strip_prefix("chapter ") {
        if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Some(line.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ChunkingSettings {
        ChunkingSettings {
            chunk_size: 200,
            chunk_overlap: 50,
            min_chunk_chars: 20,
        }
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!(
                "Sentence number {} says something about embodied cognition. ",
                i
            ));
        }
        text
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = sample_text();
        let a = chunk("embodied-mind", &text, &[], &settings()).unwrap();
        let b = chunk("embodied-mind", &text, &[], &settings()).unwrap();

        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_chunk_ids_are_positional() {
        let text = sample_text();
        let chunks = chunk("embodied-mind", &text, &[], &settings()).unwrap();

        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_id, format!("embodied-mind:{:04}", i));
            assert_eq!(c.position as usize, i);
        }
    }

    #[test]
    fn test_chunk_window_bounds() {
        let text = sample_text();
        let cfg = settings();
        let chunks = chunk("embodied-mind", &text, &[], &cfg).unwrap();

        for c in &chunks {
            assert!(!c.text.trim().is_empty());
            assert!(c.text.len() <= cfg.chunk_size);
            assert!(c.text.len() >= cfg.min_chunk_chars);
        }
    }

    #[test]
    fn test_chunks_overlap() {
        let text = sample_text();
        let chunks = chunk("embodied-mind", &text, &[], &settings()).unwrap();
        assert!(chunks.len() >= 2);

        // Consecutive chunks share text because each window starts `overlap`
        // characters before the previous end.
        let first = &chunks[0].text;
        let second = &chunks[1].text;
        let tail: String = first.chars().rev().take(20).collect::<String>();
        let tail: String = tail.chars().rev().collect();
        assert!(
            second.contains(tail.trim()) || first.len() < 40,
            "expected overlap between consecutive chunks"
        );
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = chunk("embodied-mind", "   \n\t ", &[], &settings()).unwrap_err();
        assert!(matches!(err, AppError::EmptyInput(_)));
    }

    #[test]
    fn test_boundary_out_of_range_rejected() {
        let text = sample_text();
        let boundaries = vec![ChapterBoundary {
            offset: text.len() + 10,
            title: "Ch. 1".to_string(),
        }];

        let err = chunk("embodied-mind", &text, &boundaries, &settings()).unwrap_err();
        assert!(matches!(err, AppError::InvalidBoundary(_)));
    }

    #[test]
    fn test_boundary_must_ascend() {
        let text = sample_text();
        let boundaries = vec![
            ChapterBoundary {
                offset: 100,
                title: "Ch. 2".to_string(),
            },
            ChapterBoundary {
                offset: 50,
                title: "Ch. 1".to_string(),
            },
        ];

        let err = chunk("embodied-mind", &text, &boundaries, &settings()).unwrap_err();
        assert!(matches!(err, AppError::InvalidBoundary(_)));
    }

    #[test]
    fn test_boundary_on_multibyte_char_rejected() {
        let text = format!("é{}", sample_text());
        let boundaries = vec![ChapterBoundary {
            offset: 1, // inside the two-byte 'é'
            title: "Ch. 1".to_string(),
        }];

        let err = chunk("embodied-mind", &text, &boundaries, &settings()).unwrap_err();
        assert!(matches!(err, AppError::InvalidBoundary(_)));
    }

    #[test]
    fn test_chapter_labels_follow_boundaries() {
        let text = sample_text();
        let midpoint = text.len() / 2;
        let mut offset = midpoint;
        while !text.is_char_boundary(offset) {
            offset += 1;
        }

        let boundaries = vec![
            ChapterBoundary {
                offset: 0,
                title: "Ch. 1".to_string(),
            },
            ChapterBoundary {
                offset,
                title: "Ch. 2".to_string(),
            },
        ];

        let chunks = chunk("embodied-mind", &text, &boundaries, &settings()).unwrap();
        assert_eq!(chunks.first().unwrap().chapter.as_deref(), Some("Ch. 1"));
        assert_eq!(chunks.last().unwrap().chapter.as_deref(), Some("Ch. 2"));
    }

    #[test]
    fn test_tiny_window_on_multibyte_text_terminates() {
        // A window narrower than one character must still make progress
        // instead of looping forever on the same offset.
        let text = "漢字のテキスト".repeat(10);
        let cfg = ChunkingSettings {
            chunk_size: 2,
            chunk_overlap: 1,
            min_chunk_chars: 0,
        };

        let chunks = chunk("embodied-mind", &text, &[], &cfg).unwrap();
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.chars().count() >= 1);
        }
    }

    #[test]
    fn test_utf8_text_chunks_cleanly() {
        let text = "Consciência incorporada é um tema central. ".repeat(30);
        let chunks = chunk("embodied-mind", &text, &[], &settings()).unwrap();
        assert!(!chunks.is_empty());
        for c in &chunks {
            // Slicing never split a character
            assert!(c.text.chars().count() > 0);
        }
    }

    #[test]
    fn test_detect_chapter_boundaries_headings() {
        let text = "Chapter 1 The Territory\n\nSome prose here.\n\n# A Markdown Heading\n\nMore prose.\nchapter without number\n";
        let boundaries = detect_chapter_boundaries(text);

        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].title, "Chapter 1 The Territory");
        assert_eq!(boundaries[0].offset, 0);
        assert_eq!(boundaries[1].title, "A Markdown Heading");
    }

    #[test]
    fn test_digest_changes_with_text() {
        let a = digest("one passage");
        let b = digest("another passage");
        assert_ne!(a, b);
        assert_eq!(a.len(), DIGEST_LEN);
        assert_eq!(a, digest("one passage"));
    }

    #[test]
    fn test_sentence_snap_prefers_period() {
        let mut text = "x".repeat(150);
        text.push('.');
        text.push(' ');
        text.push_str(&"y".repeat(200));

        let cfg = settings();
        let chunks = chunk("b", &text, &[], &cfg).unwrap();
        assert!(chunks[0].text.ends_with('.'));
    }
}
