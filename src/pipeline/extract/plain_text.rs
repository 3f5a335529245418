//! Pure-Rust text-only backend built on `pdf-extract`.

use super::{BackendKind, ExtractionRequest, PageExtractor};
use crate::error::ExtractionError;
use crate::output::PageRecord;
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, warn};

/// Extracts per-page text without any native dependency. Never yields images.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PageExtractor for PlainTextExtractor {
    fn kind(&self) -> BackendKind {
        BackendKind::PlainText
    }

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<Vec<PageRecord>, ExtractionError> {
        let not_readable = |detail: String| ExtractionError::NotReadable {
            path: request.pdf_path.to_path_buf(),
            backend: BackendKind::PlainText,
            detail,
        };

        let bytes = std::fs::read(request.pdf_path).map_err(|e| not_readable(e.to_string()))?;

        // pdf-extract panics on some malformed fonts and streams.
        let result = panic::catch_unwind(AssertUnwindSafe(|| match request.password {
            Some(password) => pdf_extract::extract_text_from_mem_by_pages_encrypted(&bytes, password),
            None => pdf_extract::extract_text_from_mem_by_pages(&bytes),
        }));
        let texts = match result {
            Ok(Ok(texts)) => texts,
            Ok(Err(e)) => return Err(not_readable(e.to_string())),
            Err(_) => return Err(not_readable("parser panicked on this document".into())),
        };

        let total_pages = texts.len();
        info!("PDF loaded: {} pages", total_pages);
        warn!("The plain-text backend does not extract images; image sections will be empty");
        request
            .progress
            .on_extraction_start(BackendKind::PlainText, total_pages);

        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(idx, text)| {
                let page_number = idx + 1;
                request.progress.on_page_extracted(page_number, total_pages, 0);
                PageRecord::new(page_number, text)
            })
            .collect();
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;

    #[test]
    fn garbage_input_is_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"%PDF-1.4\nthis is not really a pdf\n").unwrap();
        let request = ExtractionRequest {
            pdf_path: &pdf,
            images_dir: &dir.path().join("images"),
            password: None,
            progress: &NoopProgressCallback,
        };
        let err = PlainTextExtractor.extract(&request).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::NotReadable {
                backend: BackendKind::PlainText,
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        let request = ExtractionRequest {
            pdf_path: &dir.path().join("nope.pdf"),
            images_dir: dir.path(),
            password: None,
            progress: &NoopProgressCallback,
        };
        assert!(PlainTextExtractor.extract(&request).is_err());
    }
}
