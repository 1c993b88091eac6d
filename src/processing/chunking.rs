//! Sliding-window chunking with page provenance.
//!
//! Each page is normalized first: every whitespace run collapses to one space and the ends are
//! trimmed. A normalized page no longer than `max_size` becomes a single chunk. Longer pages are
//! cut into windows of `max_size` characters; each window after the first starts `overlap`
//! characters before the previous window ended, and the walk stops at the first window that
//! reaches the end of the text. Adjacent chunks therefore share exactly `overlap` characters and
//! the last chunk always ends with the page's tail.
//!
//! Lengths are counted in `char`s so multi-byte text never splits inside a code point.

use super::types::{Chunk, ChunkingError, ChunkingParams};
use crate::extraction::Page;

/// Chunk every page, restarting `chunk_index` at zero for each page.
///
/// Blank pages contribute nothing. Fails only when the parameters cannot guarantee progress.
pub fn chunk_pages(
    pages: &[Page],
    max_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    let params = ChunkingParams::new(max_size, overlap)?;
    Ok(chunk_pages_with(pages, params))
}

/// Chunk pages with already-validated parameters.
pub fn chunk_pages_with(pages: &[Page], params: ChunkingParams) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in pages {
        let page_chunks = split_text(&page.text, params);
        tracing::trace!(
            page = page.number,
            chunks = page_chunks.len(),
            "Chunked page"
        );
        chunks.extend(
            page_chunks
                .into_iter()
                .enumerate()
                .map(|(chunk_index, text)| Chunk {
                    page_number: page.number,
                    chunk_index,
                    text,
                }),
        );
    }
    chunks
}

/// Split one page of text into overlapping windows.
pub fn split_text(text: &str, params: ChunkingParams) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() <= params.max_size() {
        return vec![normalized];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + params.max_size()).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(params.overlap());
    }
    chunks
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
