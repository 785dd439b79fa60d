//! Concrete ingest steps and the pipeline factory.
//!
//! The ingest pipeline is Convert → Chunk → Embed → Persist. Each step reads
//! its inputs from the [`PipelineContext`](crate::PipelineContext) slots the
//! previous step filled, and skips itself when those inputs are missing
//! (which only happens when an earlier step was itself skipped).

mod chunk;
mod convert;
mod embed;
mod persist;

use std::sync::Arc;
use std::time::Duration;

use libris_chunk::{ChunkParams, TokenChunker};
use libris_core::{Error, LibraryPaths, StorageFormat};
use libris_embed::EmbeddingPool;
use libris_extract::ExtractorRegistry;

use crate::engine::Pipeline;

pub use chunk::ChunkStep;
pub use convert::ConvertStep;
pub use embed::EmbedStep;
pub use persist::PersistStep;

/// Ingest pipeline configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Chunking parameters (window, overlap, encoder)
    pub chunk: ChunkParams,
    /// Maximum texts per provider call
    pub embedding_batch_size: usize,
    /// Persisted format
    pub storage_format: StorageFormat,
    /// Soft per-run timeout
    pub soft_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkParams::default(),
            embedding_batch_size: 96,
            storage_format: StorageFormat::Json,
            soft_timeout: Duration::from_secs(300),
        }
    }
}

/// Assemble the document ingest pipeline.
pub fn ingest_pipeline(
    paths: LibraryPaths,
    extractors: Arc<ExtractorRegistry>,
    embedder: Arc<EmbeddingPool>,
    config: &IngestConfig,
) -> Result<Pipeline, Error> {
    let chunker = TokenChunker::new(config.chunk.clone())?;
    let tokenizer = chunker.tokenizer().clone();

    let steps: Vec<Box<dyn crate::engine::PipelineStep>> = vec![
        Box::new(ConvertStep::new(extractors, paths.clone())),
        Box::new(ChunkStep::new(chunker, paths.clone())),
        Box::new(EmbedStep::new(
            embedder,
            tokenizer,
            config.embedding_batch_size,
        )),
        Box::new(PersistStep::new(
            config.storage_format,
            paths,
            config.chunk.clone(),
        )),
    ];

    Ok(Pipeline::new("document_ingest", steps).with_timeout(config.soft_timeout))
}
