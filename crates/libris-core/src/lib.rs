//! # libris-core
//!
//! Core types and traits for the libris document search service.
//!
//! libris ingests user documents, converts them into token-bounded chunks,
//! embeds the chunks through a remote vector-embedding provider, persists the
//! result per document, and answers natural-language queries against the
//! per-user library. This crate provides the foundational abstractions shared
//! by the rest of the workspace:
//!
//! - **Text extraction**: [`TextExtractor`] trait for turning uploaded files
//!   into plain text
//! - **Embedding generation**: [`EmbeddingService`] trait for batched,
//!   order-preserving vector embeddings
//! - **Vector persistence**: [`EmbeddingStore`] trait for per-document
//!   embedding sets in interchangeable on-disk formats
//! - **Path resolution**: [`LibraryPaths`], the pure mapping from a base
//!   directory and user id to the four per-user directories
//!
//! ## Architecture
//!
//! ```text
//! Upload → TextExtractor → Chunker → EmbeddingService → EmbeddingStore
//!                                                            ↓
//!                                            SearchQuery → SearchResponse
//! ```
//!
//! ## Related Crates
//!
//! - `libris-extract`: extractor registry and format adapters
//! - `libris-chunk`: BPE tokenization and token-window chunking
//! - `libris-embed`: remote and deterministic embedding services
//! - `libris-store`: row-oriented JSON and columnar binary stores
//! - `libris-pipeline`: step engine, ingest steps, upload gate, worker queue
//! - `libris-search`: cosine and hybrid ranking over a user's library

pub mod error;
pub mod paths;
pub mod traits;
pub mod types;

pub use error::{
    ChunkError, EmbedError, Error, ExtractError, PipelineError, Result, SearchError, StoreError,
    UploadError,
};
pub use paths::LibraryPaths;
pub use traits::*;
pub use types::*;
