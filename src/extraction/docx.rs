use super::{DOCX_MIME, ExtractionError, Page};
use docx_rs::{DocumentChild, ParagraphChild, RunChild};

/// Collect body paragraph text and emit it as page 1; DOCX has no stable page boundaries.
pub(super) fn extract_pages(bytes: &[u8]) -> Result<Vec<Page>, ExtractionError> {
    let docx = docx_rs::read_docx(bytes).map_err(|err| ExtractionError::Malformed {
        content_type: DOCX_MIME,
        reason: err.to_string(),
    })?;

    let mut paragraphs = Vec::new();
    for child in docx.document.children {
        let DocumentChild::Paragraph(paragraph) = child else {
            continue;
        };
        let mut text = String::new();
        for child in paragraph.children {
            let ParagraphChild::Run(run) = child else {
                continue;
            };
            for child in run.children {
                match child {
                    RunChild::Text(fragment) => text.push_str(&fragment.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
        if !text.trim().is_empty() {
            paragraphs.push(text);
        }
    }

    if paragraphs.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Page::new(1, paragraphs.join("\n\n"))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};
    use std::io::Cursor;

    fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }
        let mut cursor = Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).expect("pack docx");
        cursor.into_inner()
    }

    #[test]
    fn paragraphs_are_joined_into_page_one() {
        let bytes = build_docx(&["First paragraph.", "   ", "Second paragraph."]);
        let pages = extract_pages(&bytes).expect("docx extraction");
        assert_eq!(
            pages,
            vec![Page::new(1, "First paragraph.\n\nSecond paragraph.")]
        );
    }

    #[test]
    fn blank_document_yields_no_pages() {
        let bytes = build_docx(&["", "  "]);
        let pages = extract_pages(&bytes).expect("docx extraction");
        assert!(pages.is_empty());
    }
}
