//! Text extraction: raw document bytes of a known content type into ordered `(page, text)` pairs.
//!
//! Dispatch is table-driven. [`ExtractorRegistry`] maps a canonical MIME string to an
//! [`ExtractionStrategy`] variant; supporting a new format means adding a variant and registering
//! it, never subclassing.

mod docx;
mod pdf;
mod text;

use std::collections::HashMap;
use thiserror::Error;

/// MIME type for PDF documents.
pub const PDF_MIME: &str = "application/pdf";
/// MIME type for Office Open XML word processing documents.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// MIME type for UTF-8 plain text.
pub const TEXT_MIME: &str = "text/plain";

/// One page of extracted text. Page numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number within the source document.
    pub number: u32,
    /// Raw page text; never blank.
    pub text: String,
}

impl Page {
    /// Build a page from a number and its text.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Errors raised while turning bytes into page text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No strategy is registered for the content type.
    #[error("Unsupported content type for extraction: {0}")]
    UnsupportedContentType(String),
    /// The bytes could not be parsed as the claimed content type.
    #[error("Failed to parse {content_type} document: {reason}")]
    Malformed {
        /// Content type the caller claimed.
        content_type: &'static str,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Extraction strategies, one per supported document family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Page-aware PDF text extraction.
    Pdf,
    /// Paragraph text from a DOCX body, emitted as a single page.
    Docx,
    /// UTF-8 text emitted as a single page.
    PlainText,
}

impl ExtractionStrategy {
    /// Run the strategy against raw bytes.
    pub fn extract(self, bytes: &[u8]) -> Result<Vec<Page>, ExtractionError> {
        let pages = match self {
            Self::Pdf => pdf::extract_pages(bytes)?,
            Self::Docx => docx::extract_pages(bytes)?,
            Self::PlainText => text::extract_pages(bytes),
        };
        Ok(pages
            .into_iter()
            .filter(|page| !page.text.trim().is_empty())
            .collect())
    }
}

/// Content-type to strategy lookup table.
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    strategies: HashMap<String, ExtractionStrategy>,
}

impl ExtractorRegistry {
    /// Create a registry with no strategies registered.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register (or replace) the strategy used for a content type.
    pub fn register(&mut self, content_type: &str, strategy: ExtractionStrategy) -> &mut Self {
        self.strategies
            .insert(normalize_content_type(content_type), strategy);
        self
    }

    /// Whether a strategy exists for the content type.
    pub fn supports(&self, content_type: &str) -> bool {
        self.strategies
            .contains_key(&normalize_content_type(content_type))
    }

    /// Convert `bytes` into ordered, non-blank pages.
    ///
    /// Returns an empty vector only when the document parsed but every page was blank.
    pub fn extract(&self, bytes: &[u8], content_type: &str) -> Result<Vec<Page>, ExtractionError> {
        let normalized = normalize_content_type(content_type);
        let strategy = self
            .strategies
            .get(&normalized)
            .copied()
            .ok_or_else(|| ExtractionError::UnsupportedContentType(content_type.to_string()))?;

        let pages = strategy.extract(bytes)?;
        tracing::debug!(
            content_type = %normalized,
            ?strategy,
            pages = pages.len(),
            bytes = bytes.len(),
            "Extracted document text"
        );
        Ok(pages)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(PDF_MIME, ExtractionStrategy::Pdf)
            .register(DOCX_MIME, ExtractionStrategy::Docx)
            .register(TEXT_MIME, ExtractionStrategy::PlainText);
        registry
    }
}

/// Strip MIME parameters (`; charset=utf-8`) and case so lookups are stable.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
