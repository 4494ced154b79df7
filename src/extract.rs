//! PDF text extraction.
//!
//! Reads a PDF from disk and returns its text page by page, each page
//! followed by a newline. Extraction failures never panic: they come back
//! as an [`ExtractError`] and the ingestion pipeline skips the file.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
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

/// Returns `true` if `path` has a `.pdf` extension, compared case-insensitively.
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Extract the text of the PDF at `path`.
pub fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_pdf_bytes(&bytes)
}

/// Extract the text of an in-memory PDF.
pub fn extract_pdf_bytes(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|payload| ExtractError::Pdf(panic_message(payload.as_ref())))?
    .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(join_pages(&pages))
}

fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page);
        text.push('\n');
    }
    text
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("parser panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("parser panicked: {}", s)
    } else {
        "parser panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_suffix_is_case_insensitive() {
        assert!(is_pdf_path(Path::new("uploads/report.pdf")));
        assert!(is_pdf_path(Path::new("uploads/REPORT.PDF")));
        assert!(is_pdf_path(Path::new("Mixed.Pdf")));
        assert!(!is_pdf_path(Path::new("notes.txt")));
        assert!(!is_pdf_path(Path::new("pdf")));
        assert!(!is_pdf_path(Path::new("archive.pdf.zip")));
    }

    #[test]
    fn pages_each_end_with_newline() {
        let pages = vec!["first".to_string(), "second".to_string()];
        assert_eq!(join_pages(&pages), "first\nsecond\n");
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pdf_bytes(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn missing_file_returns_io_error() {
        let err = extract_pdf(Path::new("/no/such/dir/missing.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
