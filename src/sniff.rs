//! Content-type detection from magic bytes and filename.

use crate::extraction::{DOCX_MIME, PDF_MIME, TEXT_MIME};
use std::path::Path;
use thiserror::Error;

/// Upload rejected before it reaches the queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SniffError {
    /// Upload carried no bytes.
    #[error("File is empty")]
    Empty,
    /// Bytes did not match any supported format.
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    /// Extension claims one format while the bytes are another.
    #[error("File extension '.{extension}' does not match detected type {detected}")]
    ExtensionMismatch {
        /// Extension taken from the filename.
        extension: String,
        /// MIME type detected from the content.
        detected: &'static str,
    },
}

/// Detect the canonical MIME type of an upload.
pub fn detect_content_type(bytes: &[u8], filename: &str) -> Result<&'static str, SniffError> {
    if bytes.is_empty() {
        return Err(SniffError::Empty);
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let detected = if bytes.starts_with(b"%PDF-") {
        PDF_MIME
    } else if bytes.starts_with(b"PK\x03\x04") {
        // Any OOXML or plain zip starts this way; only the extension tells DOCX apart.
        if extension.as_deref() == Some("docx") {
            DOCX_MIME
        } else {
            return Err(SniffError::Unsupported(
                "zip archive without a .docx extension".to_string(),
            ));
        }
    } else if std::str::from_utf8(bytes).is_ok() {
        TEXT_MIME
    } else {
        return Err(SniffError::Unsupported(
            "binary content is not PDF, DOCX, or UTF-8 text".to_string(),
        ));
    };

    if let Some(extension) = extension
        && !extension_matches(filename, detected)
    {
        return Err(SniffError::ExtensionMismatch {
            extension,
            detected,
        });
    }

    Ok(detected)
}

/// Whether the type guessed from the filename agrees with the detected content.
///
/// Any `text/*` guess is compatible with UTF-8 content. An extension the MIME table does not
/// know is tolerated for text only.
fn extension_matches(filename: &str, detected: &str) -> bool {
    match mime_guess::from_path(filename).first_raw() {
        Some(guessed) if detected == TEXT_MIME => guessed.starts_with("text/"),
        Some(guessed) => guessed == detected,
        None => detected == TEXT_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_supported_formats() {
        assert_eq!(detect_content_type(b"%PDF-1.7\n...", "a.pdf"), Ok(PDF_MIME));
        assert_eq!(
            detect_content_type(b"PK\x03\x04rest", "Report.DOCX"),
            Ok(DOCX_MIME)
        );
        assert_eq!(detect_content_type("héllo".as_bytes(), "a.txt"), Ok(TEXT_MIME));
        assert_eq!(detect_content_type(b"plain", "README"), Ok(TEXT_MIME));
    }

    #[test]
    fn rejects_mismatched_extensions() {
        assert_eq!(
            detect_content_type(b"hello", "fake.pdf"),
            Err(SniffError::ExtensionMismatch {
                extension: "pdf".into(),
                detected: TEXT_MIME
            })
        );
    }

    #[test]
    fn text_accepts_any_text_extension() {
        for name in ["notes.md", "table.csv", "page.html", "server.log", "notes.zzqx"] {
            assert_eq!(detect_content_type(b"hello", name), Ok(TEXT_MIME), "{name}");
        }
        assert!(matches!(
            detect_content_type(b"{\"a\":1}", "data.json"),
            Err(SniffError::ExtensionMismatch { .. })
        ));
    }

    #[test]
    fn binary_formats_need_their_own_extension() {
        assert!(matches!(
            detect_content_type(b"%PDF-1.4", "scan.zzqx"),
            Err(SniffError::ExtensionMismatch { .. })
        ));
        assert!(matches!(
            detect_content_type(b"%PDF-1.4", "scan.png"),
            Err(SniffError::ExtensionMismatch { .. })
        ));
        assert_eq!(detect_content_type(b"%PDF-1.4", "scan"), Ok(PDF_MIME));
    }

    #[test]
    fn rejects_unsupported_content() {
        assert!(matches!(
            detect_content_type(b"PK\x03\x04", "archive.zip"),
            Err(SniffError::Unsupported(_))
        ));
        assert!(matches!(
            detect_content_type(&[0xFF, 0xD8, 0xFF, 0xE0], "photo.jpg"),
            Err(SniffError::Unsupported(_))
        ));
        assert_eq!(detect_content_type(b"", "a.txt"), Err(SniffError::Empty));
    }
}
