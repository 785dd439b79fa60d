//! Plain-text family extractor.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use libris_core::{ExtractError, TextExtractor};

/// Extractor for formats that are already text: TXT, JSON, XML.
///
/// The content is copied through unchanged after UTF-8 validation.
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn supported_types(&self) -> &[&str] {
        &["text/plain", "application/json", "application/xml", "text/xml"]
    }

    fn can_extract_by_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "txt" | "json" | "xml" | "text" | "log"
                )
            })
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = fs::read(path).await?;
        String::from_utf8(bytes)
            .map_err(|e| ExtractError::InvalidUtf8(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn passes_text_through_unchanged() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("note.txt");
        std::fs::write(&path, "hello world").unwrap();

        let text = PlainTextExtractor::new().extract(&path).await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn rejects_invalid_utf8() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("bad.txt");
        std::fs::write(&path, [0xFF, 0xFE, 0x00, 0x41]).unwrap();

        let err = PlainTextExtractor::new().extract(&path).await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUtf8(_)));
    }

    #[test]
    fn extension_fallback() {
        let e = PlainTextExtractor::new();
        assert!(e.can_extract_by_extension(Path::new("a.txt")));
        assert!(e.can_extract_by_extension(Path::new("a.JSON")));
        assert!(!e.can_extract_by_extension(Path::new("a.pdf")));
    }
}
