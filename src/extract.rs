//! Page text extraction for PDF documents.
//!
//! Extraction returns one string per page. Pages without text come back
//! empty and are dropped later by [`prepare_text`](opsdesk_core::chunk::prepare_text).
//! A file that cannot be parsed at all is an [`ExtractError`]; the ingest
//! pipeline counts it as a failed file and moves on. `pdf-extract` panics on
//! some malformed documents (e.g. a font missing from `/Resources`); those
//! panics are caught and reported as [`ExtractError::Pdf`].

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Turns a document file into per-page text.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError>;

    fn extract_file(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.extract_pages(&bytes)
    }
}

/// [`TextExtractor`] backed by `pdf-extract`.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
            Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
            Err(payload) => Err(ExtractError::Pdf(format!(
                "extractor panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

/// Text of a panic payload, when it carries one.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
