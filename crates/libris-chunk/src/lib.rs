//! # libris-chunk
//!
//! BPE tokenization and token-window chunking.
//!
//! Chunk boundaries are tokenizer-exact: the converted text is encoded once,
//! sliced into fixed-size token windows with a configurable leading overlap,
//! and each window is decoded back to text. Consecutive chunks therefore
//! share exactly `floor(chunk_size × overlap_fraction)` tokens, and the
//! union of unique tokens across all chunks is the full document.
//!
//! Encoders are addressed by name (`cl100k_base` by default) and cached
//! process-wide after first load; a [`Tokenizer`] handle is cheap to clone.
//!
//! ```rust
//! use libris_chunk::{ChunkParams, TokenChunker};
//!
//! # fn main() -> Result<(), libris_core::ChunkError> {
//! let chunker = TokenChunker::new(ChunkParams::default())?;
//! let chunks = chunker.split("hello world")?;
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0], "hello world");
//! # Ok(())
//! # }
//! ```

pub mod splitter;
pub mod tokenizer;

pub use splitter::{chunk_filename, ChunkParams, TokenChunker};
pub use tokenizer::Tokenizer;
