//! # libris-extract
//!
//! MIME detection and text extraction for uploaded documents.
//!
//! Extraction is adapter-based: each supported format implements
//! [`TextExtractor`](libris_core::TextExtractor) and registers with the
//! [`ExtractorRegistry`], which dispatches on the detected MIME type and
//! falls back to the filename extension. The heavy lifting for PDF and
//! spreadsheet formats is delegated to the respective format libraries; the
//! adapters here only normalize their output into plain UTF-8 text.
//!
//! ## Built-in adapters
//!
//! | Adapter | Formats |
//! |---------|---------|
//! | [`PlainTextExtractor`] | TXT, JSON, XML (UTF-8 validated copy) |
//! | [`CsvExtractor`] | CSV (row-by-row, tab-joined cells) |
//! | [`PdfExtractor`] | PDF |
//! | [`DocxExtractor`] | DOCX, DOC |
//! | [`SpreadsheetExtractor`] | XLSX, XLS (sheet-by-sheet, row-by-row) |
//!
//! MIME detection in [`detect`] sniffs content signatures from the leading
//! bytes and only consults the filename when the bytes are inconclusive.

pub mod csv;
pub mod detect;
pub mod office;
pub mod pdf;
pub mod registry;
pub mod text;

pub use self::csv::CsvExtractor;
pub use detect::{allowed_mime_types, detect_mime};
pub use office::{DocxExtractor, SpreadsheetExtractor};
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;
pub use text::PlainTextExtractor;
