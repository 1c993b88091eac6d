use super::{ExtractionError, PDF_MIME, Page};
use lopdf::Document;

/// Extract text page by page so chunk provenance keeps real page numbers.
pub(super) fn extract_pages(bytes: &[u8]) -> Result<Vec<Page>, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|err| malformed(err.to_string()))?;
    if document.is_encrypted() {
        return Err(malformed("document is encrypted".to_string()));
    }

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut pages = Vec::with_capacity(page_numbers.len());

    for number in page_numbers {
        let text = document
            .extract_text(&[number])
            .map_err(|err| malformed(format!("page {number}: {err}")))?;
        if text.trim().is_empty() {
            tracing::trace!(page = number, "Skipping blank PDF page");
            continue;
        }
        pages.push(Page::new(number, text));
    }

    Ok(pages)
}

fn malformed(reason: String) -> ExtractionError {
    ExtractionError::Malformed {
        content_type: PDF_MIME,
        reason,
    }
}
