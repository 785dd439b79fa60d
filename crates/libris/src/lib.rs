//! # libris
//!
//! Per-user document ingestion and semantic search.
//!
//! This crate assembles the workspace components into a running service:
//! environment-driven [`config::Settings`], the [`service::LibraryService`]
//! facade (ingest, search, stats, algorithms, health), and the CLI binary in
//! `main.rs`.
//!
//! ```rust,ignore
//! use libris::config::Settings;
//! use libris::service::LibraryService;
//! use libris_embed::{CohereConfig, CohereEmbedder};
//! use libris_pipeline::QueueConfig;
//! use std::sync::Arc;
//!
//! let settings = Settings::from_env()?;
//! let embedder = Arc::new(CohereEmbedder::new(CohereConfig::new(
//!     settings.embedding_api_key.clone().unwrap(),
//!     settings.embedding_model.clone(),
//! ))?);
//! let service = LibraryService::start(&settings, embedder, QueueConfig::default())?;
//!
//! let receipt = service
//!     .ingest(&b"hello world"[..], "hi.txt", "user@example.com", None)
//!     .await?;
//! ```

pub mod config;
pub mod service;
