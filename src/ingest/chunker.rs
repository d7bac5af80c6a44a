//! Word-window chunking.
//!
//! Documents are split on whitespace and re-joined into overlapping
//! windows. Chunks come out in document order; that order is what breaks
//! ranking ties downstream.

use crate::core::errors::RagError;

/// Split `text` into chunks of at most `size` words, consecutive chunks
/// sharing `overlap` words.
///
/// The window advances by `size - overlap` words, so `overlap` must be
/// strictly smaller than `size`. Empty input yields an empty vec.
pub fn chunk_words(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, RagError> {
    if size == 0 {
        return Err(RagError::Configuration(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    if overlap >= size {
        return Err(RagError::Configuration(format!(
            "chunk overlap {} must be smaller than chunk size {}",
            overlap, size
        )));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        start += stride;
    }

    Ok(chunks)
}
