//! MIME detection from leading bytes with extension fallback.

use std::path::Path;

/// MIME types the ingest path accepts.
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_TXT: &str = "text/plain";
pub const MIME_JSON: &str = "application/json";
pub const MIME_XML: &str = "application/xml";

/// The upload allow-list.
#[must_use]
pub fn allowed_mime_types() -> &'static [&'static str] {
    &[
        MIME_PDF, MIME_DOCX, MIME_DOC, MIME_XLSX, MIME_XLS, MIME_CSV, MIME_TXT, MIME_JSON,
        MIME_XML, "text/xml",
    ]
}

/// Detect the MIME type of a file from its leading bytes, consulting the
/// claimed filename only where the bytes are ambiguous (ZIP and OLE
/// containers, text dialects) or carry no recognizable signature.
#[must_use]
pub fn detect_mime(head: &[u8], filename: &str) -> String {
    let ext = extension_of(filename);

    if head.starts_with(b"%PDF-") {
        return MIME_PDF.to_string();
    }

    // ZIP container: office open formats share the signature, the member
    // layout distinguishes them, which we leave to the extension.
    if head.starts_with(b"PK\x03\x04") {
        return match ext.as_deref() {
            Some("docx") => MIME_DOCX.to_string(),
            Some("xlsx") => MIME_XLSX.to_string(),
            _ => "application/zip".to_string(),
        };
    }

    // OLE compound document: legacy office formats.
    if head.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return match ext.as_deref() {
            Some("doc") => MIME_DOC.to_string(),
            Some("xls") => MIME_XLS.to_string(),
            _ => "application/x-ole-storage".to_string(),
        };
    }

    if looks_like_text(head) {
        return match ext.as_deref() {
            Some("csv") => MIME_CSV.to_string(),
            Some("json") => MIME_JSON.to_string(),
            Some("xml") => MIME_XML.to_string(),
            _ => MIME_TXT.to_string(),
        };
    }

    // No signature matched: extension-based guess, octet-stream as a last
    // resort.
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Heuristic: the head is text when it is UTF-8 (allowing a multi-byte
/// sequence cut at the buffer edge) and free of NUL bytes.
fn looks_like_text(head: &[u8]) -> bool {
    if head.is_empty() || head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && head.len() - e.valid_up_to() < 4,
    }
}
