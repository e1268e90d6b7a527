//! Text extraction by MIME type.
//!
//! Plain-text formats are passed through, PDFs are read page by page up to a
//! cap, and everything else has no extractable content.

use std::path::Path;
use tally_core::{AppError, AppResult};

const TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/x-yaml",
    "application/yaml",
    "text/markdown",
    "text/csv",
];

/// Extract text from raw bytes.
///
/// Returns `None` for unsupported types and for content that fails to
/// extract; the failure is logged, never propagated.
pub fn extract_text(mime_type: &str, bytes: &[u8], pdf_page_cap: usize) -> Option<String> {
    let mime = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime.starts_with("text/") || TEXT_MIME_TYPES.contains(&mime.as_str()) {
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }

    if mime == "application/pdf" {
        return match extract_pdf(bytes, pdf_page_cap) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error_class = e.class(), "{}", e);
                None
            }
        };
    }

    tracing::debug!(mime_type = %mime, "No extractor for content type");
    None
}

/// Text of the first `page_cap` pages, in page order.
fn extract_pdf(bytes: &[u8], page_cap: usize) -> AppResult<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| AppError::Extraction(format!("Failed to load PDF: {}", e)))?;

    let pages: Vec<u32> = doc.get_pages().keys().copied().take(page_cap).collect();
    if pages.is_empty() {
        return Ok(String::new());
    }

    doc.extract_text(&pages)
        .map_err(|e| AppError::Extraction(format!("Failed to extract PDF text: {}", e)))
}

/// Infer a MIME type from a file extension, defaulting to
/// `application/octet-stream`.
pub fn mime_from_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
