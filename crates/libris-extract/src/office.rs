//! Office document extractors: DOCX/DOC and XLSX/XLS.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader as _};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use libris_core::{ExtractError, TextExtractor};

use crate::detect::{MIME_DOC, MIME_DOCX, MIME_XLS, MIME_XLSX};

// ============================================================================
// Word documents
// ============================================================================

/// Extractor for Word documents.
///
/// DOCX is a ZIP container; the text lives in `word/document.xml` as `w:t`
/// runs. Paragraph and table structure is flattened to newlines, tabs stay
/// tabs. Legacy OLE `.doc` files are claimed but rejected at parse time.
pub struct DocxExtractor;

impl DocxExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for DocxExtractor {
    fn supported_types(&self) -> &[&str] {
        &[MIME_DOCX, MIME_DOC]
    }

    fn can_extract_by_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ext.eq_ignore_ascii_case("docx") || ext.eq_ignore_ascii_case("doc")
            })
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!(path = %path.display(), "extracting Word document");
        let bytes = tokio::fs::read(path).await?;

        tokio::task::spawn_blocking(move || extract_docx_text(&bytes))
            .await
            .map_err(|e| ExtractError::Failed(format!("task join error: {e}")))?
    }
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Parse(format!("not a DOCX container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Parse(format!("missing word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Parse(format!("unreadable document.xml: {e}")))?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Parse(format!("bad XML text: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ExtractError::Parse(format!("XML parse error: {e}"))),
        }
    }

    Ok(out.trim_end().to_string())
}

// ============================================================================
// Spreadsheets
// ============================================================================

/// Extractor for Excel workbooks (XLSX and legacy XLS).
///
/// Sheets are serialized in order with a `--- Sheet: name ---` header and one
/// row per line, cells joined by tabs.
pub struct SpreadsheetExtractor;

impl SpreadsheetExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for SpreadsheetExtractor {
    fn supported_types(&self) -> &[&str] {
        &[MIME_XLSX, MIME_XLS]
    }

    fn can_extract_by_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls")
            })
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!(path = %path.display(), "extracting spreadsheet");
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || extract_sheet_text(&path))
            .await
            .map_err(|e| ExtractError::Failed(format!("task join error: {e}")))?
    }
}

fn extract_sheet_text(path: &Path) -> Result<String, ExtractError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ExtractError::Parse(format!("cannot open workbook: {e}")))?;

    let sheet_names = workbook.sheet_names().to_owned();
    let mut sections = Vec::new();

    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Parse(format!("sheet '{name}': {e}")))?;

        let mut lines = vec![format!("--- Sheet: {name} ---")];
        for row in range.rows() {
            lines.push(
                row.iter()
                    .map(cell_text)
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
        sections.push(lines.join("\n"));
    }

    Ok(sections.join("\n\n"))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR:{e:?}"),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docx_text_runs_are_flattened() {
        // Minimal DOCX: ZIP with a word/document.xml member.
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Cell A</w:t></w:r><w:r><w:tab/></w:r><w:r><w:t>Cell B</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            writer
                .start_file("word/document.xml", zip::write::FileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut writer, xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }

        let text = extract_docx_text(&buf).unwrap();
        assert_eq!(text, "First paragraph.\nCell A\tCell B");
    }

    #[test]
    fn non_zip_bytes_are_a_parse_error() {
        let err = extract_docx_text(b"this is not a zip").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn cell_text_formats() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("x".to_string())), "x");
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(3.25)), "3.25");
        assert_eq!(cell_text(&Data::Int(-7)), "-7");
        assert_eq!(cell_text(&Data::Bool(true)), "true");
    }

    #[test]
    fn extension_claims() {
        let d = DocxExtractor::new();
        assert!(d.can_extract_by_extension(Path::new("a.docx")));
        assert!(d.can_extract_by_extension(Path::new("a.DOC")));

        let s = SpreadsheetExtractor::new();
        assert!(s.can_extract_by_extension(Path::new("a.xlsx")));
        assert!(s.can_extract_by_extension(Path::new("a.xls")));
        assert!(!s.can_extract_by_extension(Path::new("a.csv")));
    }
}
