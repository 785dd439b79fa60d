//! Core traits for libris components.
//!
//! - [`TextExtractor`]: turn an uploaded file into plain text
//! - [`EmbeddingService`]: batched, order-preserving vector embeddings
//! - [`EmbeddingStore`]: persist and load per-document embedding sets
//!
//! These traits are the seams at which implementations can be swapped: the
//! extractor registry holds `dyn TextExtractor` adapters per format, the
//! pipeline and search engine share a `dyn EmbeddingService`, and each
//! on-disk format is a `dyn EmbeddingStore`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{EmbedError, ExtractError, StoreError};
use crate::types::{DocumentId, EmbeddingSet, StorageFormat};

// ============================================================================
// Text extraction
// ============================================================================

/// Trait for format-specific text extraction.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// MIME types this extractor handles.
    fn supported_types(&self) -> &[&str];

    /// Extension-based fallback when MIME detection is inconclusive.
    fn can_extract_by_extension(&self, _path: &Path) -> bool {
        false
    }

    /// Whether this extractor can handle the given file.
    fn can_extract(&self, path: &Path, mime_type: &str) -> bool {
        self.supported_types().contains(&mime_type) || self.can_extract_by_extension(path)
    }

    /// Extract the file's text content as UTF-8.
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for vector-embedding providers.
///
/// Implementations must preserve request-to-response order and return vectors
/// of a single declared dimension.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Model identifier recorded with every vector this service produces.
    fn model_name(&self) -> &str;

    /// Dimension of the vectors this service produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of document chunks. The output list matches the input
    /// order and length.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a search query. Providers that distinguish document and query
    /// inputs override this.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::InvalidResponse("empty embedding result".to_string()))
    }
}

// ============================================================================
// Vector persistence
// ============================================================================

/// Trait for persisting one user's embedding sets in a single directory.
///
/// A store instance is bound to a `processed_vectors/` directory; documents
/// are keyed by [`DocumentId`]. Writes are atomic: a loader never observes a
/// partially written set.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// The on-disk format this store reads and writes.
    fn format(&self) -> StorageFormat;

    /// Persist a set, replacing any previous set for the same document.
    /// Returns the path written.
    async fn save(&self, set: &EmbeddingSet) -> Result<PathBuf, StoreError>;

    /// Load the set for a document.
    async fn load(&self, document_id: &DocumentId) -> Result<EmbeddingSet, StoreError>;

    /// Whether a set exists for the document.
    async fn exists(&self, document_id: &DocumentId) -> bool;

    /// Delete the set for a document. Returns whether anything was removed.
    async fn delete(&self, document_id: &DocumentId) -> Result<bool, StoreError>;

    /// All document ids with a persisted set in this store's format.
    async fn list(&self) -> Result<Vec<DocumentId>, StoreError>;
}
