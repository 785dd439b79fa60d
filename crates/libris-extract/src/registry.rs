//! Extractor registry keyed by MIME type.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use libris_core::{ExtractError, TextExtractor};

use crate::{CsvExtractor, DocxExtractor, PdfExtractor, PlainTextExtractor, SpreadsheetExtractor};

/// Registry of text extractors.
pub struct ExtractorRegistry {
    /// Named extractors
    extractors: HashMap<String, Arc<dyn TextExtractor>>,
    /// MIME type to extractor name mapping
    mime_mapping: HashMap<String, String>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            mime_mapping: HashMap::new(),
        }
    }

    /// Registry with all built-in adapters registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("text", PlainTextExtractor::new());
        registry.register("csv", CsvExtractor::new());
        registry.register("pdf", PdfExtractor::new());
        registry.register("docx", DocxExtractor::new());
        registry.register("spreadsheet", SpreadsheetExtractor::new());
        registry
    }

    /// Register an extractor under a name, claiming its MIME types.
    pub fn register<E: TextExtractor + 'static>(&mut self, name: &str, extractor: E) {
        let extractor = Arc::new(extractor);
        for mime in extractor.supported_types() {
            self.mime_mapping
                .insert((*mime).to_string(), name.to_string());
        }
        self.extractors.insert(name.to_string(), extractor);
    }

    /// Get an extractor for a MIME type.
    #[must_use]
    pub fn get_for_mime(&self, mime_type: &str) -> Option<Arc<dyn TextExtractor>> {
        self.mime_mapping
            .get(mime_type)
            .and_then(|name| self.extractors.get(name))
            .cloned()
    }

    /// Get an extractor for a file, trying MIME first, then extensions.
    #[must_use]
    pub fn get_for_file(&self, path: &Path, mime_type: &str) -> Option<Arc<dyn TextExtractor>> {
        if let Some(extractor) = self.get_for_mime(mime_type) {
            return Some(extractor);
        }

        for extractor in self.extractors.values() {
            if extractor.can_extract(path, mime_type) {
                return Some(extractor.clone());
            }
        }

        None
    }

    /// Whether any registered extractor handles the MIME type.
    #[must_use]
    pub fn supports(&self, mime_type: &str) -> bool {
        self.mime_mapping.contains_key(mime_type)
    }

    /// Extract text from a file, dispatching on the detected MIME type.
    pub async fn extract(&self, path: &Path, mime_type: &str) -> Result<String, ExtractError> {
        let extractor = self
            .get_for_file(path, mime_type)
            .ok_or_else(|| ExtractError::UnsupportedType(mime_type.to_string()))?;

        extractor.extract(path).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
