//! # libris-store
//!
//! [`EmbeddingStore`](libris_core::EmbeddingStore) implementations.
//!
//! | Backend | Format | File |
//! |---------|--------|------|
//! | [`JsonStore`] | Row-oriented JSON, human readable | `{doc_id}_embeddings.json` |
//! | [`ColumnarStore`] | Columnar compressed binary | `{doc_id}_embeddings.h5` |
//!
//! Both stores are bound to one `processed_vectors/` directory, write through
//! a temporary sibling path with a final rename (readers never observe a
//! partial set), and round-trip every field of an
//! [`EmbeddingSet`](libris_core::EmbeddingSet) exactly — vectors are float32
//! in both formats, so equality is bit-for-bit.
//!
//! [`load_library`] enumerates a directory across both formats, which is how
//! the search engine assembles a user's library.

pub mod columnar;
pub mod json;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use libris_core::{DocumentId, EmbeddingSet, EmbeddingStore, StorageFormat, StoreError};

pub use columnar::ColumnarStore;
pub use json::JsonStore;

/// Suffix shared by both formats, before the extension.
const FILE_SUFFIX: &str = "_embeddings";

/// Build a store for the given format over a `processed_vectors/` directory.
#[must_use]
pub fn store_for(format: StorageFormat, dir: impl Into<PathBuf>) -> Arc<dyn EmbeddingStore> {
    match format {
        StorageFormat::Json => Arc::new(JsonStore::new(dir)),
        StorageFormat::Hdf5 => Arc::new(ColumnarStore::new(dir)),
    }
}

/// The storage format a persisted vector file was written in, judged by its
/// extension. `None` for unrelated files.
#[must_use]
pub fn format_of(path: &Path) -> Option<StorageFormat> {
    let name = path.file_name()?.to_str()?;
    if !name.contains(FILE_SUFFIX) {
        return None;
    }
    match path.extension()?.to_str()? {
        "json" => Some(StorageFormat::Json),
        "h5" => Some(StorageFormat::Hdf5),
        _ => None,
    }
}

/// Vector filename for a document in the given format.
#[must_use]
pub fn vector_filename(document_id: &DocumentId, format: StorageFormat) -> String {
    format!("{document_id}{FILE_SUFFIX}.{}", format.extension())
}

/// Document id recovered from a vector filename, if it is one.
#[must_use]
pub fn document_id_of(path: &Path) -> Option<DocumentId> {
    let stem = path.file_stem()?.to_str()?;
    let id_part = stem.strip_suffix(FILE_SUFFIX)?;
    DocumentId::parse(id_part).ok()
}

/// Load every persisted set in a `processed_vectors/` directory, across both
/// formats. Unreadable sets are skipped with a warning so one corrupt file
/// does not hide the rest of the library.
pub async fn load_library(dir: &Path) -> Result<Vec<EmbeddingSet>, StoreError> {
    let mut sets = Vec::new();
    if !dir.exists() {
        return Ok(sets);
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files: Vec<(DocumentId, StorageFormat)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let (Some(id), Some(format)) = (document_id_of(&path), format_of(&path)) {
            files.push((id, format));
        }
    }
    files.sort_by_key(|(id, _)| *id);

    for (id, format) in files {
        let store = store_for(format, dir);
        match store.load(&id).await {
            Ok(set) => sets.push(set),
            Err(e) => warn!(document_id = %id, error = %e, "skipping unreadable embedding set"),
        }
    }

    Ok(sets)
}
