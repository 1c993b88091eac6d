//! Core data types and error definitions for chunking.

use thiserror::Error;

/// Errors produced while splitting page text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// The window cannot advance: `max_size` is zero or `overlap >= max_size`.
    #[error("invalid chunking parameters: max_size={max_size}, overlap={overlap}")]
    InvalidParameters {
        /// Requested maximum chunk length in characters.
        max_size: usize,
        /// Requested overlap in characters.
        overlap: usize,
    },
}

/// Validated window geometry for the sliding chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    max_size: usize,
    overlap: usize,
}

impl ChunkingParams {
    /// Validate and build parameters; the window must always move forward.
    pub fn new(max_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if max_size == 0 || overlap >= max_size {
            return Err(ChunkingError::InvalidParameters { max_size, overlap });
        }
        Ok(Self { max_size, overlap })
    }

    /// Maximum characters per chunk.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Characters shared by adjacent chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// A bounded slice of a page's normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Page the text came from (1-based).
    pub page_number: u32,
    /// Position within the page, zero-based and gap-free.
    pub chunk_index: usize,
    /// Normalized chunk text.
    pub text: String,
}
