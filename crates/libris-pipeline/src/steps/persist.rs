//! Vector persistence step.

use async_trait::async_trait;
use chrono::Utc;

use libris_chunk::ChunkParams;
use libris_core::{EmbeddingSet, Error, LibraryPaths, SetMetadata, StorageFormat, StoreError};
use libris_store::store_for;

use crate::context::PipelineContext;
use crate::engine::PipelineStep;

/// Persists the embedded chunks as one set under `processed_vectors/`.
pub struct PersistStep {
    format: StorageFormat,
    paths: LibraryPaths,
    chunk_params: ChunkParams,
}

impl PersistStep {
    #[must_use]
    pub fn new(format: StorageFormat, paths: LibraryPaths, chunk_params: ChunkParams) -> Self {
        Self {
            format,
            paths,
            chunk_params,
        }
    }
}

#[async_trait]
impl PipelineStep for PersistStep {
    fn name(&self) -> &str {
        "vector_storage"
    }

    fn max_retries(&self) -> u32 {
        2
    }

    fn should_skip(&self, context: &PipelineContext) -> bool {
        context.embeddings.is_none()
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<String, Error> {
        let chunks = context
            .embeddings
            .clone()
            .ok_or_else(|| StoreError::Persist("no embeddings in context".to_string()))?;

        let embedding_model = chunks
            .first()
            .map(|c| c.embedding_model.clone())
            .unwrap_or_default();

        let set = EmbeddingSet {
            document_id: context.document_id,
            chunks,
            metadata: SetMetadata {
                user_id: context.user_id.to_string(),
                original_filename: context.original_filename.clone(),
                chunk_size: self.chunk_params.chunk_size,
                chunk_overlap: self.chunk_params.overlap_fraction,
                embedding_model,
                ingested_at: Utc::now(),
            },
        };

        let store = store_for(self.format, self.paths.processed_vectors(&context.user_id));
        let path = store.save(&set).await?;

        context
            .attributes
            .insert("storage_path".to_string(), path.display().to_string());

        Ok(format!(
            "stored {} embeddings at {}",
            set.embedding_count(),
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_core::{DocumentId, EmbeddedChunk, UserId};
    use tempfile::tempdir;

    fn context_with_embeddings(dir: &std::path::Path, count: usize) -> PipelineContext {
        let mut ctx = PipelineContext::new(
            DocumentId::generate(),
            UserId::parse("u@x.io").unwrap(),
            "doc.txt",
            dir.join("raw"),
        );
        ctx.embeddings = Some(
            (0..count)
                .map(|i| EmbeddedChunk {
                    filename: format!("doc_chunk_{i:03}.txt"),
                    text: format!("chunk {i}"),
                    token_count: 2,
                    embedding: vec![i as f32; 8],
                    embedding_model: "hash-v1-8".to_string(),
                })
                .collect(),
        );
        ctx
    }

    #[tokio::test]
    async fn persists_a_set_and_records_the_path() {
        let tmp = tempdir().unwrap();
        let step = PersistStep::new(
            StorageFormat::Json,
            LibraryPaths::new(tmp.path()),
            ChunkParams::default(),
        );
        let mut ctx = context_with_embeddings(tmp.path(), 3);

        let message = step.execute(&mut ctx).await.unwrap();
        assert!(message.contains("stored 3 embeddings"));

        let stored_path = ctx.attributes.get("storage_path").unwrap();
        assert!(stored_path.ends_with(&format!("{}_embeddings.json", ctx.document_id)));

        let store = store_for(
            StorageFormat::Json,
            LibraryPaths::new(tmp.path()).processed_vectors(&ctx.user_id),
        );
        let set = store.load(&ctx.document_id).await.unwrap();
        assert_eq!(set.embedding_count(), 3);
        assert_eq!(set.metadata.original_filename, "doc.txt");
        assert_eq!(set.metadata.chunk_size, 512);
        assert_eq!(set.metadata.embedding_model, "hash-v1-8");
    }

    #[tokio::test]
    async fn columnar_format_is_honored() {
        let tmp = tempdir().unwrap();
        let step = PersistStep::new(
            StorageFormat::Hdf5,
            LibraryPaths::new(tmp.path()),
            ChunkParams::default(),
        );
        let mut ctx = context_with_embeddings(tmp.path(), 2);

        step.execute(&mut ctx).await.unwrap();
        assert!(ctx.attributes.get("storage_path").unwrap().ends_with(".h5"));
    }

    #[tokio::test]
    async fn skips_without_embeddings() {
        let tmp = tempdir().unwrap();
        let step = PersistStep::new(
            StorageFormat::Json,
            LibraryPaths::new(tmp.path()),
            ChunkParams::default(),
        );
        let ctx = PipelineContext::new(
            DocumentId::generate(),
            UserId::parse("u@x.io").unwrap(),
            "doc.txt",
            tmp.path().join("raw"),
        );
        assert!(step.should_skip(&ctx));
    }
}
