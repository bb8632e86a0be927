//! Text extraction for uploaded documents.
//!
//! Incoming bytes are sniffed as either PDF (by file extension or the `%PDF-`
//! magic prefix) or plain UTF-8 text. PDF extraction runs on the blocking
//! thread pool because `pdf-extract` parses the whole document synchronously.

use thiserror::Error;

/// Errors raised while turning uploaded bytes into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Content is binary but not a recognized document format.
    #[error("Unsupported document format for '{0}'")]
    UnsupportedFormat(String),
    /// Content matched a known format but could not be parsed.
    #[error("Failed to parse '{file}': {message}")]
    Parse {
        /// Name of the document that failed to parse.
        file: String,
        /// Human-readable parser diagnostic.
        message: String,
    },
    /// The blocking extraction task was cancelled or panicked.
    #[error("Extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// PDF document, extracted via `pdf-extract`.
    Pdf,
    /// Anything else, decoded as UTF-8 text.
    Text,
}

/// Sniff the document format from its file name and leading bytes.
pub fn sniff_kind(file_name: &str, bytes: &[u8]) -> DocumentKind {
    let lowered = file_name.to_lowercase();
    if lowered.ends_with(".pdf") || bytes.starts_with(b"%PDF-") {
        DocumentKind::Pdf
    } else {
        DocumentKind::Text
    }
}

/// Extract the full text of an uploaded document.
///
/// Returns the empty string for empty inputs; callers treat zero extracted
/// text as a document with zero chunks, not an error.
pub async fn extract_text(file_name: &str, bytes: Vec<u8>) -> Result<String, ExtractError> {
    match sniff_kind(file_name, &bytes) {
        DocumentKind::Pdf => extract_pdf(file_name, bytes).await,
        DocumentKind::Text => decode_utf8(file_name, &bytes),
    }
}

async fn extract_pdf(file_name: &str, bytes: Vec<u8>) -> Result<String, ExtractError> {
    let name = file_name.to_string();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await?
        .map_err(|err| ExtractError::Parse {
            file: name,
            message: err.to_string(),
        })?;
    Ok(text)
}

fn decode_utf8(file_name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        // Binary content without a PDF header is not something we can chunk.
        Err(_) => Err(ExtractError::UnsupportedFormat(file_name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_pdf_by_extension_and_magic() {
        assert_eq!(sniff_kind("report.PDF", b"junk"), DocumentKind::Pdf);
        assert_eq!(sniff_kind("renamed.bin", b"%PDF-1.7 rest"), DocumentKind::Pdf);
        assert_eq!(sniff_kind("notes.txt", b"hello"), DocumentKind::Text);
    }

    #[tokio::test]
    async fn decodes_plain_text() {
        let text = extract_text("notes.txt", b"hello world".to_vec())
            .await
            .expect("plain text extraction");
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn rejects_binary_content_that_is_not_pdf() {
        let error = extract_text("blob.dat", vec![0xff, 0xfe, 0x00, 0x01])
            .await
            .expect_err("binary content");
        assert!(matches!(error, ExtractError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn surfaces_parse_error_for_malformed_pdf() {
        let error = extract_text("broken.pdf", b"%PDF-not really".to_vec())
            .await
            .expect_err("malformed pdf");
        assert!(matches!(error, ExtractError::Parse { .. }));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_text() {
        let text = extract_text("empty.txt", Vec::new())
            .await
            .expect("empty text extraction");
        assert!(text.is_empty());
    }
}
