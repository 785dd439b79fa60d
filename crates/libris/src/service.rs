//! Service facade wiring the components together.
//!
//! This is the surface the external endpoints call into: ingest, search,
//! library stats, algorithm listing, and a liveness marker. HTTP framing and
//! authentication live outside this crate.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tracing::warn;

use libris_chunk::ChunkParams;
use libris_core::{
    EmbeddingService, Error, LibraryPaths, LibraryStats, SearchAlgorithm, SearchError,
    SearchResponse, UploadError, UploadReceipt, UserId,
};
use libris_embed::EmbeddingPool;
use libris_extract::ExtractorRegistry;
use libris_pipeline::{
    ingest_pipeline, CancelSignal, GateConfig, IngestConfig, IngestEvent, IngestQueue,
    QueueConfig, UploadGate,
};
use libris_search::SearchEngine;
use libris_store::load_library;

use crate::config::Settings;

/// Maximum concurrent provider calls shared by ingest and search.
const EMBED_CONCURRENCY: usize = 4;

/// The assembled service: upload gate, background ingest, and search.
pub struct LibraryService {
    paths: LibraryPaths,
    gate: UploadGate,
    queue: IngestQueue,
    search: SearchEngine,
}

impl LibraryService {
    /// Wire up the service over an embedding provider and start the ingest
    /// workers.
    pub fn start(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingService>,
        queue_config: QueueConfig,
    ) -> Result<Self, Error> {
        let paths = LibraryPaths::new(settings.base_dir.clone());
        let extractors = Arc::new(ExtractorRegistry::with_defaults());
        let pool = Arc::new(EmbeddingPool::new(embedder, EMBED_CONCURRENCY));

        let ingest_config = IngestConfig {
            chunk: ChunkParams {
                chunk_size: settings.chunk_size,
                overlap_fraction: settings.chunk_overlap,
                encoder: settings.tokenizer_name.clone(),
            },
            embedding_batch_size: settings.embedding_batch_size,
            storage_format: settings.vector_storage,
            soft_timeout: settings.pipeline_timeout,
        };

        let pipeline = Arc::new(ingest_pipeline(
            paths.clone(),
            extractors,
            Arc::clone(&pool),
            &ingest_config,
        )?);
        let queue = IngestQueue::start(pipeline, queue_config);

        let gate = UploadGate::new(
            paths.clone(),
            GateConfig {
                max_file_size: settings.max_file_size,
                ..Default::default()
            },
        )
        .with_queue(queue.sender());

        let search = SearchEngine::new(paths.clone(), pool);

        Ok(Self {
            paths,
            gate,
            queue,
            search,
        })
    }

    /// Accept an upload and enqueue background processing.
    pub async fn ingest<R: AsyncRead + Unpin>(
        &self,
        source: R,
        filename: &str,
        user: &str,
        description: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        self.gate.accept(source, filename, user, description).await
    }

    /// Search the user's library.
    pub async fn search(
        &self,
        user: &str,
        query: &str,
        algorithm: &str,
        limit: usize,
    ) -> Result<SearchResponse, SearchError> {
        let algorithm = SearchAlgorithm::from_name(algorithm)?;
        self.search.search(user, query, algorithm, limit).await
    }

    /// Statistics over one user's library. Unknown or malformed users report
    /// a non-existent library rather than an error.
    pub async fn library_stats(&self, user: &str) -> Result<LibraryStats, Error> {
        let Ok(user) = UserId::parse(user) else {
            return Ok(LibraryStats::default());
        };
        if !self.paths.user_root(&user).exists() {
            return Ok(LibraryStats::default());
        }

        let sets = load_library(&self.paths.processed_vectors(&user)).await?;
        let chunk_count = sets.iter().map(|s| s.chunks.len()).sum();
        let chunks_with_embeddings = sets
            .iter()
            .flat_map(|s| &s.chunks)
            .filter(|c| !c.embedding.is_empty())
            .count();

        let mut total_upload_bytes = 0u64;
        let uploads = self.paths.raw_uploads(&user);
        if uploads.exists() {
            let mut entries = tokio::fs::read_dir(&uploads).await?;
            while let Some(entry) = entries.next_entry().await? {
                match entry.metadata().await {
                    Ok(meta) if meta.is_file() => total_upload_bytes += meta.len(),
                    Ok(_) => {}
                    Err(e) => warn!(path = ?entry.path(), error = %e, "unreadable upload entry"),
                }
            }
        }

        Ok(LibraryStats {
            exists: true,
            document_count: sets.len(),
            chunk_count,
            chunks_with_embeddings,
            total_upload_bytes,
        })
    }

    /// The advertised search algorithms.
    #[must_use]
    pub fn algorithms(&self) -> Vec<&'static str> {
        SearchAlgorithm::all().iter().map(|a| a.as_str()).collect()
    }

    /// Liveness marker.
    #[must_use]
    pub fn health(&self) -> &'static str {
        "ok"
    }

    /// Subscribe to ingest lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.queue.subscribe()
    }

    /// The signal observed by running pipelines.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.queue.cancel_signal()
    }

    /// Drain pending ingest work and stop the workers.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }
}
