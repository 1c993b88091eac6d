//! Document processing utilities: page-aware chunking.

pub mod chunking;
pub mod types;

pub use chunking::{chunk_pages, chunk_pages_with, normalize_whitespace, split_text};
pub use types::{Chunk, ChunkingError, ChunkingParams};
