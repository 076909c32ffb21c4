//! Fixed-length character chunking.
//!
//! Chunk boundaries fall on `char` boundaries and carry no word or sentence awareness.
//! The split is deterministic and lossless: concatenating the chunks in order reproduces
//! the input exactly, which the map phase relies on to keep narrative order intact.

use super::types::ChunkingError;

/// Split text into contiguous chunks of at most `max_chars` characters.
///
/// Every chunk except possibly the last is exactly `max_chars` characters long.
/// Empty input yields an empty vector; a zero bound is rejected.
pub(crate) fn chunk_text(text: &str, max_chars: usize) -> Result<Vec<String>, ChunkingError> {
    if max_chars == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::with_capacity(text.len() / max_chars + 1);
    let mut current = String::with_capacity(max_chars.min(text.len()));
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    Ok(chunks)
}
