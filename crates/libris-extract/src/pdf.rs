//! PDF text extractor.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use libris_core::{ExtractError, TextExtractor};

/// Extractor for PDF files, delegating to `pdf-extract`.
pub struct PdfExtractor;

impl PdfExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    fn supported_types(&self) -> &[&str] {
        &["application/pdf"]
    }

    fn can_extract_by_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!(path = %path.display(), "extracting PDF");
        let bytes = tokio::fs::read(path).await?;

        // pdf-extract is CPU-bound and blocking.
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| ExtractError::Parse(format!("PDF extraction failed: {e}")))
        })
        .await
        .map_err(|e| ExtractError::Failed(format!("task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_pdf_by_mime_and_extension() {
        let e = PdfExtractor::new();
        assert!(e.supported_types().contains(&"application/pdf"));
        assert!(e.can_extract_by_extension(Path::new("report.PDF")));
        assert!(!e.can_extract_by_extension(Path::new("report.txt")));
    }

    #[tokio::test]
    async fn garbage_bytes_fail_with_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.7 then nothing useful").unwrap();

        let err = PdfExtractor::new().extract(&path).await.unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
