//! Embedding generation step.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use libris_chunk::Tokenizer;
use libris_core::{EmbedError, EmbeddedChunk, Error};
use libris_embed::EmbeddingPool;

use crate::context::PipelineContext;
use crate::engine::PipelineStep;

/// Embeds the chunk files through the provider, in batches, preserving the
/// lexicographic (= emission) order of the chunk filenames.
pub struct EmbedStep {
    embedder: Arc<EmbeddingPool>,
    tokenizer: Tokenizer,
    batch_size: usize,
}

impl EmbedStep {
    #[must_use]
    pub fn new(embedder: Arc<EmbeddingPool>, tokenizer: Tokenizer, batch_size: usize) -> Self {
        Self {
            embedder,
            tokenizer,
            batch_size: batch_size.max(1),
        }
    }

    async fn chunk_files(&self, context: &PipelineContext) -> Result<Vec<PathBuf>, Error> {
        if let Some(files) = &context.chunk_files {
            return Ok(files.clone());
        }

        // Runs resumed without the in-memory file list fall back to a
        // directory scan; lexicographic order equals emission order.
        let dir = context
            .chunks_dir
            .clone()
            .ok_or_else(|| EmbedError::InvalidResponse("no chunks directory in context".to_string()))?;
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(Error::Io)?;
        while let Some(entry) = entries.next_entry().await.map_err(Error::Io)? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "txt") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl PipelineStep for EmbedStep {
    fn name(&self) -> &str {
        "embedding_generation"
    }

    fn max_retries(&self) -> u32 {
        2
    }

    fn should_skip(&self, context: &PipelineContext) -> bool {
        context.chunks_dir.is_none()
    }

    fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        let retriable = match error {
            Error::Embedding(e) => e.is_retriable(),
            _ => true,
        };
        retriable && attempt < self.max_retries()
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<String, Error> {
        let files = self.chunk_files(context).await?;
        if files.is_empty() {
            return Err(EmbedError::InvalidResponse("no chunk files found".to_string()).into());
        }

        let mut filenames = Vec::with_capacity(files.len());
        let mut texts = Vec::with_capacity(files.len());
        for path in &files {
            let text = tokio::fs::read_to_string(path).await.map_err(Error::Io)?;
            filenames.push(
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string(),
            );
            texts.push(text);
        }

        let model = self.embedder.model_name().to_string();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(
                document_id = %context.document_id,
                batch = batch.len(),
                model = %model,
                "embedding batch"
            );
            let batch_vectors = self.embedder.embed_documents(batch).await?;
            if batch_vectors.len() != batch.len() {
                return Err(EmbedError::InvalidResponse(format!(
                    "requested {} embeddings, received {}",
                    batch.len(),
                    batch_vectors.len()
                ))
                .into());
            }
            vectors.extend(batch_vectors);
        }

        let embeddings: Vec<EmbeddedChunk> = filenames
            .into_iter()
            .zip(texts)
            .zip(vectors)
            .map(|((filename, text), embedding)| EmbeddedChunk {
                token_count: self.tokenizer.count(&text),
                filename,
                text,
                embedding,
                embedding_model: model.clone(),
            })
            .collect();

        let count = embeddings.len();
        context.embeddings = Some(embeddings);
        Ok(format!("generated {count} embeddings using {model}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_core::{DocumentId, EmbeddingService, UserId};
    use libris_embed::HashEmbedder;
    use tempfile::tempdir;

    fn step(batch: usize) -> EmbedStep {
        EmbedStep::new(
            Arc::new(EmbeddingPool::new(Arc::new(HashEmbedder::new(32)), 2)),
            Tokenizer::by_name("cl100k_base").unwrap(),
            batch,
        )
    }

    fn context_with_chunks(dir: &std::path::Path, chunks: &[&str]) -> PipelineContext {
        let chunks_dir = dir.join("raw_chunks");
        std::fs::create_dir_all(&chunks_dir).unwrap();
        let mut files = Vec::new();
        for (i, text) in chunks.iter().enumerate() {
            let path = chunks_dir.join(format!("doc_chunk_{i:03}.txt"));
            std::fs::write(&path, text).unwrap();
            files.push(path);
        }
        let mut ctx = PipelineContext::new(
            DocumentId::generate(),
            UserId::parse("u@x.io").unwrap(),
            "doc.txt",
            dir.join("raw"),
        );
        ctx.chunks_dir = Some(chunks_dir);
        ctx.chunk_count = Some(chunks.len());
        ctx.chunk_files = Some(files);
        ctx
    }

    #[tokio::test]
    async fn embeds_every_chunk_in_order() {
        let tmp = tempdir().unwrap();
        let step = step(96);
        let mut ctx = context_with_chunks(tmp.path(), &["alpha text", "beta text", "gamma text"]);

        let message = step.execute(&mut ctx).await.unwrap();
        assert!(message.contains("generated 3 embeddings"));

        let embeddings = ctx.embeddings.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0].filename, "doc_chunk_000.txt");
        assert_eq!(embeddings[0].text, "alpha text");
        assert_eq!(embeddings[2].filename, "doc_chunk_002.txt");
        assert!(embeddings.iter().all(|e| e.embedding.len() == 32));
        assert!(embeddings.iter().all(|e| e.token_count > 0));
    }

    #[tokio::test]
    async fn batching_preserves_order() {
        let tmp = tempdir().unwrap();
        let step = step(2);
        let texts: Vec<String> = (0..7).map(|i| format!("chunk number {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut ctx = context_with_chunks(tmp.path(), &refs);

        step.execute(&mut ctx).await.unwrap();

        let embedder = HashEmbedder::new(32);
        let embeddings = ctx.embeddings.unwrap();
        for (i, chunk) in embeddings.iter().enumerate() {
            let expected = embedder
                .embed_documents(&[texts[i].clone()])
                .await
                .unwrap();
            assert_eq!(chunk.embedding, expected[0], "order broken at {i}");
        }
    }

    #[tokio::test]
    async fn empty_chunk_dir_fails() {
        let tmp = tempdir().unwrap();
        let step = step(96);
        let mut ctx = context_with_chunks(tmp.path(), &[]);
        ctx.chunk_files = None;

        let err = step.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn skips_without_chunks_dir() {
        let tmp = tempdir().unwrap();
        let step = step(96);
        let ctx = PipelineContext::new(
            DocumentId::generate(),
            UserId::parse("u@x.io").unwrap(),
            "doc.txt",
            tmp.path().join("raw"),
        );
        assert!(step.should_skip(&ctx));
    }

    #[tokio::test]
    async fn directory_scan_fallback_orders_lexicographically() {
        let tmp = tempdir().unwrap();
        let step = step(96);
        let mut ctx = context_with_chunks(tmp.path(), &["zero", "one", "two"]);
        ctx.chunk_files = None;

        step.execute(&mut ctx).await.unwrap();
        let embeddings = ctx.embeddings.unwrap();
        let names: Vec<&str> = embeddings.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(
            names,
            ["doc_chunk_000.txt", "doc_chunk_001.txt", "doc_chunk_002.txt"]
        );
    }
}
