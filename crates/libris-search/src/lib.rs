//! # libris-search
//!
//! Ranking over a user's persisted embedding sets.
//!
//! The [`SearchEngine`] loads every set under the user's
//! `processed_vectors/` directory (both storage formats), embeds the query
//! with the same provider used at ingest, and ranks chunks with one of two
//! algorithms:
//!
//! - **cosine** — pure cosine similarity against the query vector
//! - **hybrid** — `0.7 · cosine + 0.3 · BM25`, each component min–max
//!   normalized over the candidate set
//!
//! Ties break deterministically by (document id ascending, chunk index
//! ascending). Libraries holding vectors from more than one embedding model
//! are restricted to the dominant model, and the response says so.

pub mod cosine;
pub mod engine;
pub mod hybrid;

pub use cosine::cosine_similarity;
pub use engine::SearchEngine;
