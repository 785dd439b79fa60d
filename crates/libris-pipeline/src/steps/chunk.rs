//! Text chunking step.

use async_trait::async_trait;
use tracing::debug;

use libris_chunk::{chunk_filename, TokenChunker};
use libris_core::{ChunkError, Error, LibraryPaths};

use crate::context::PipelineContext;
use crate::engine::PipelineStep;

/// Splits the converted text into token-window chunk files under
/// `raw_chunks/`.
pub struct ChunkStep {
    chunker: TokenChunker,
    paths: LibraryPaths,
}

impl ChunkStep {
    #[must_use]
    pub fn new(chunker: TokenChunker, paths: LibraryPaths) -> Self {
        Self { chunker, paths }
    }
}

#[async_trait]
impl PipelineStep for ChunkStep {
    fn name(&self) -> &str {
        "text_chunking"
    }

    fn max_retries(&self) -> u32 {
        1
    }

    fn should_skip(&self, context: &PipelineContext) -> bool {
        context.converted_text_path.is_none()
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<String, Error> {
        let text_path = context
            .converted_text_path
            .clone()
            .ok_or_else(|| ChunkError::Failed("no converted text path in context".to_string()))?;

        let text = tokio::fs::read_to_string(&text_path)
            .await
            .map_err(ChunkError::Io)?;

        let chunks = self.chunker.split(&text)?;
        if chunks.is_empty() {
            return Err(ChunkError::Failed(format!(
                "converted text at {} produced no tokens",
                text_path.display()
            ))
            .into());
        }

        let chunks_dir = self.paths.raw_chunks(&context.user_id);
        tokio::fs::create_dir_all(&chunks_dir)
            .await
            .map_err(ChunkError::Io)?;

        let stem = context.file_stem();
        let total = chunks.len();
        let mut chunk_files = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let path = chunks_dir.join(chunk_filename(&stem, i, total));
            tokio::fs::write(&path, chunk.as_bytes())
                .await
                .map_err(ChunkError::Io)?;
            chunk_files.push(path);
        }

        debug!(
            document_id = %context.document_id,
            chunks = total,
            dir = %chunks_dir.display(),
            "wrote chunk files"
        );

        context.chunks_dir = Some(chunks_dir);
        context.chunk_count = Some(total);
        context.chunk_files = Some(chunk_files);

        Ok(format!("text chunked into {total} pieces"))
    }
}
