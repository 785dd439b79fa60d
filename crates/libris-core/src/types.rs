//! Core types for libris.
//!
//! ## Identity
//! - [`DocumentId`]: opaque per-upload identifier (UUID v4)
//! - [`UserId`]: validated email-shaped library namespace key
//!
//! ## Embeddings
//! - [`EmbeddedChunk`]: one chunk's text, token count and vector
//! - [`SetMetadata`]: document-level metadata stored alongside the vectors
//! - [`EmbeddingSet`]: a document's complete embedded-chunk payload
//! - [`StorageFormat`]: on-disk format selector for persisted sets
//!
//! ## Search
//! - [`SearchAlgorithm`]: the supported ranking algorithms
//! - [`SearchHit`] / [`SearchResponse`]: ranked results with provenance
//!
//! ## Service surface
//! - [`UploadReceipt`]: what the upload gate returns to the caller
//! - [`LibraryStats`]: per-user library statistics

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SearchError, StoreError, UploadError};

// ============================================================================
// Identity
// ============================================================================

/// Opaque identifier assigned to a document at upload time.
///
/// Rendered in the canonical 36-character hyphenated form everywhere it
/// appears on disk: as the prefix of the raw upload filename and as the key
/// of the persisted vector file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its canonical string form.
    pub fn parse(value: &str) -> Result<Self, StoreError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| StoreError::Corrupt(format!("not a valid document id: {value}")))
    }

    /// Extract the id from an uploaded filename of the form `{id}_{original}`.
    pub fn from_upload_filename(filename: &str) -> Result<Self, StoreError> {
        let (id_part, _) = filename
            .split_once('_')
            .ok_or_else(|| StoreError::Corrupt(format!("unexpected upload name: {filename}")))?;
        Self::parse(id_part)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

static USER_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid user id pattern")
});

/// A user's library namespace key.
///
/// Syntactically an email address; nothing is ever sent to it. The shape is
/// enforced at the upload and search boundaries so directory names stay
/// predictable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap a user id.
    pub fn parse(value: &str) -> Result<Self, UploadError> {
        if USER_ID_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(UploadError::InvalidUser(value.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Embeddings
// ============================================================================

static CHUNK_SEQ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+_chunk_(\d+)$").expect("valid chunk name pattern"));

/// One embedded chunk of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// Chunk filename under `raw_chunks/`, e.g. `report_chunk_003.txt`
    pub filename: String,
    /// The chunk text
    pub text: String,
    /// Token count under the ingest tokenizer
    pub token_count: usize,
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Model that produced the vector
    pub embedding_model: String,
}

impl EmbeddedChunk {
    /// Zero-based sequence index recovered from the `_chunk_NNN` filename
    /// suffix. Returns `None` for filenames that do not follow the chunk
    /// naming scheme.
    #[must_use]
    pub fn sequence_index(&self) -> Option<usize> {
        let stem = self.filename.strip_suffix(".txt").unwrap_or(&self.filename);
        CHUNK_SEQ_RE
            .captures(stem)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Document-level metadata persisted with an embedding set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMetadata {
    /// Owning user id
    pub user_id: String,
    /// Filename the document was uploaded under
    pub original_filename: String,
    /// Chunk size in tokens used at ingest
    pub chunk_size: usize,
    /// Overlap fraction used at ingest
    pub chunk_overlap: f32,
    /// Embedding model used at ingest
    pub embedding_model: String,
    /// When the document was ingested
    pub ingested_at: DateTime<Utc>,
}

/// The complete set of embedded chunks for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSet {
    /// Owning document id
    pub document_id: DocumentId,
    /// Chunks in emission order
    pub chunks: Vec<EmbeddedChunk>,
    /// Document-level metadata
    pub metadata: SetMetadata,
}

impl EmbeddingSet {
    /// Number of embedded chunks in the set.
    #[must_use]
    pub fn embedding_count(&self) -> usize {
        self.chunks.len()
    }

    /// Vector dimension, taken from the first chunk. `None` for empty sets.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }
}

/// On-disk format of a persisted embedding set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Row-oriented JSON, one record per chunk
    Json,
    /// Columnar compressed binary container
    Hdf5,
}

impl StorageFormat {
    /// Name used in configuration and in the persisted `storage_format` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Hdf5 => "hdf5",
        }
    }

    /// File extension used under `processed_vectors/`.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Hdf5 => "h5",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, StoreError> {
        match name {
            "json" => Ok(Self::Json),
            "hdf5" => Ok(Self::Hdf5),
            other => Err(StoreError::UnknownFormat(other.to_string())),
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Ranking algorithm for a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAlgorithm {
    /// Pure cosine similarity against the query embedding
    Cosine,
    /// Weighted cosine + BM25 lexical score
    Hybrid,
}

impl SearchAlgorithm {
    /// All supported algorithms, in the order they are advertised.
    #[must_use]
    pub fn all() -> [Self; 2] {
        [Self::Cosine, Self::Hybrid]
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, SearchError> {
        match name {
            "cosine" => Ok(Self::Cosine),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(SearchError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based rank
    pub rank: usize,
    /// Final score under the selected algorithm
    pub score: f32,
    /// The chunk text
    pub text: String,
    /// Zero-based chunk index within its document
    pub chunk_index: usize,
    /// Owning document
    pub document_id: DocumentId,
    /// Original filename of the owning document
    pub source_filename: String,
}

/// A completed search with execution metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query text as received
    pub query: String,
    /// Algorithm actually used
    pub algorithm: SearchAlgorithm,
    /// Ranked hits, best first
    pub hits: Vec<SearchHit>,
    /// Documents considered
    pub documents_searched: usize,
    /// Chunks scored
    pub chunks_searched: usize,
    /// Embedding model the query was embedded with
    pub model_used: Option<String>,
    /// True when a mixed-model library was restricted to its dominant model
    pub model_restricted: bool,
    /// Wall-clock time spent serving the search
    pub execution_time: Duration,
}

// ============================================================================
// Service surface
// ============================================================================

/// Returned by the upload gate once the raw bytes are durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Freshly assigned document id
    pub document_id: DocumentId,
    /// Sanitized original filename
    pub original_filename: String,
    /// Bytes persisted
    pub size_bytes: u64,
    /// Detected MIME type
    pub mime_type: String,
    /// Whether background processing was enqueued
    pub queued: bool,
}

/// Statistics over one user's library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryStats {
    /// Whether the user has any on-disk presence
    pub exists: bool,
    /// Persisted embedding sets
    pub document_count: usize,
    /// Chunks across all sets
    pub chunk_count: usize,
    /// Chunks carrying a non-empty embedding
    pub chunks_with_embeddings: usize,
    /// Total size of raw uploads in bytes
    pub total_upload_bytes: u64,
}
