//! CSV extractor.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use libris_core::{ExtractError, TextExtractor};

/// Extractor for CSV files.
///
/// Rows are serialized one per line with tab-joined cells, which keeps the
/// tabular structure legible to the chunker without carrying quoting rules
/// into the text.
pub struct CsvExtractor;

impl CsvExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for CsvExtractor {
    fn supported_types(&self) -> &[&str] {
        &["text/csv"]
    }

    fn can_extract_by_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = fs::read(path).await?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let mut lines = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ExtractError::Parse(e.to_string()))?;
            lines.push(record.iter().collect::<Vec<_>>().join("\t"));
        }

        Ok(lines.join("\n"))
    }
}
