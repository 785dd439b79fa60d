//! Row-oriented JSON storage.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use libris_core::{
    DocumentId, EmbeddedChunk, EmbeddingSet, EmbeddingStore, SetMetadata, StorageFormat,
    StoreError,
};

use crate::{document_id_of, format_of, vector_filename};

/// Human-readable row-oriented storage: one JSON document per embedding set,
/// chunks as an ordered array of records.
///
/// Field order is fixed by the serde struct, so persisting the same set twice
/// produces byte-identical files.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, document_id: &DocumentId) -> PathBuf {
        self.dir.join(vector_filename(document_id, StorageFormat::Json))
    }
}

/// On-disk shape of a persisted set.
#[derive(Serialize, Deserialize)]
struct SetFile {
    file_id: DocumentId,
    embeddings: Vec<EmbeddedChunk>,
    metadata: SetMetadata,
    storage_format: String,
    embedding_count: usize,
}

#[async_trait]
impl EmbeddingStore for JsonStore {
    fn format(&self) -> StorageFormat {
        StorageFormat::Json
    }

    async fn save(&self, set: &EmbeddingSet) -> Result<PathBuf, StoreError> {
        let file = SetFile {
            file_id: set.document_id,
            embeddings: set.chunks.clone(),
            metadata: set.metadata.clone(),
            storage_format: StorageFormat::Json.as_str().to_string(),
            embedding_count: set.chunks.len(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&set.document_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), chunks = set.chunks.len(), "persisted embedding set");
        Ok(path)
    }

    async fn load(&self, document_id: &DocumentId) -> Result<EmbeddingSet, StoreError> {
        let path = self.path_for(document_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    document_id: document_id.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;

        let file: SetFile = serde_json::from_slice(&bytes)?;
        if file.file_id != *document_id {
            return Err(StoreError::Corrupt(format!(
                "set at {} claims id {}",
                path.display(),
                file.file_id
            )));
        }
        if file.embedding_count != file.embeddings.len() {
            return Err(StoreError::Corrupt(format!(
                "embedding_count {} does not match {} records",
                file.embedding_count,
                file.embeddings.len()
            )));
        }

        Ok(EmbeddingSet {
            document_id: file.file_id,
            chunks: file.embeddings,
            metadata: file.metadata,
        })
    }

    async fn exists(&self, document_id: &DocumentId) -> bool {
        self.path_for(document_id).exists()
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<bool, StoreError> {
        let path = self.path_for(document_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<DocumentId>, StoreError> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if format_of(&path) == Some(StorageFormat::Json) {
                if let Some(id) = document_id_of(&path) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_set;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_load_round_trips_exactly() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path());
        let set = sample_set(3, 16);

        let path = store.save(&set).await.unwrap();
        assert!(path.ends_with(vector_filename(&set.document_id, StorageFormat::Json)));

        let loaded = store.load(&set.document_id).await.unwrap();
        assert_eq!(loaded, set);
    }

    #[tokio::test]
    async fn persist_is_byte_idempotent() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path());
        let set = sample_set(2, 8);

        let path = store.save(&set).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        store.save(&set).await.unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn no_temp_file_survives_a_save() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path());
        store.save(&sample_set(1, 4)).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path());
        let err = store.load(&DocumentId::generate()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn exists_delete_list() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path());
        let a = sample_set(1, 4);
        let b = sample_set(1, 4);

        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        assert!(store.exists(&a.document_id).await);
        let mut expected = vec![a.document_id, b.document_id];
        expected.sort();
        assert_eq!(store.list().await.unwrap(), expected);

        assert!(store.delete(&a.document_id).await.unwrap());
        assert!(!store.delete(&a.document_id).await.unwrap());
        assert!(!store.exists(&a.document_id).await);
        assert_eq!(store.list().await.unwrap(), vec![b.document_id]);
    }

    #[tokio::test]
    async fn count_mismatch_is_corrupt() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path());
        let set = sample_set(2, 4);
        let path = store.save(&set).await.unwrap();

        let mut value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        value["embedding_count"] = serde_json::json!(99);
        std::fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();

        let err = store.load(&set.document_id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn empty_set_round_trips() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path());
        let set = sample_set(0, 0);
        store.save(&set).await.unwrap();
        let loaded = store.load(&set.document_id).await.unwrap();
        assert_eq!(loaded.embedding_count(), 0);
        assert_eq!(loaded.dimension(), None);
    }
}
