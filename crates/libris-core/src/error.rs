//! Error types for libris.

use thiserror::Error;

/// Main error type aggregating the per-component errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Upload rejected or failed
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Text extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Chunking failed
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Search failed
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Pipeline run failed
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Upload gate errors. These surface synchronously to the caller.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("invalid user id: {0}")]
    InvalidUser(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("upload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunking failed: {0}")]
    Failed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Transient provider failure (network, 5xx, 429). Retriable.
    #[error("embedding provider unavailable{}: {message}", status_suffix(.status))]
    Provider { status: Option<u16>, message: String },

    /// Credential rejected. Never retried.
    #[error("embedding provider rejected credentials: {0}")]
    Auth(String),

    /// Response did not match the request (count or dimension). Never retried.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding API key not configured")]
    MissingCredentials,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl EmbedError {
    /// Whether the pipeline retry budget applies to this failure.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("persist failed: {0}")]
    Persist(String),

    #[error("no persisted embeddings for document {document_id}")]
    NotFound { document_id: String },

    #[error("corrupt embedding set: {0}")]
    Corrupt(String),

    #[error("unsupported storage format '{0}' (available: json, hdf5)")]
    UnknownFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Search errors. These surface synchronously to the caller.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("no library found for user: {0}")]
    EmptyLibrary(String),

    #[error("unsupported search algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("failed to embed query: {0}")]
    EmbeddingFailed(String),

    #[error("limit must be between 1 and 100, got {0}")]
    InvalidLimit(usize),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Pipeline run errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("pipeline timed out after {0} seconds")]
    TimedOut(u64),
}

/// Result type alias for libris operations.
pub type Result<T> = std::result::Result<T, Error>;
