//! Environment-driven configuration.
//!
//! Settings are read once at startup; core components receive plain values
//! and never touch the environment themselves. Malformed numeric values are
//! configuration errors, not silent defaults.

use std::path::PathBuf;
use std::time::Duration;

use libris_core::{Error, StorageFormat};

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Credential for the remote embedding provider (`EMBEDDING_API_KEY`)
    pub embedding_api_key: Option<String>,
    /// Root of the per-user directories (`BASE_DIR`, default `./data`)
    pub base_dir: PathBuf,
    /// Upload byte cap (`MAX_FILE_SIZE`, default 50 MiB)
    pub max_file_size: u64,
    /// Persisted vector format (`VECTOR_STORAGE_TYPE`, `json` | `hdf5`)
    pub vector_storage: StorageFormat,
    /// Log filter (`LOG_LEVEL`, default `INFO`)
    pub log_level: String,
    /// Chunk window in tokens (`CHUNK_SIZE`, default 512)
    pub chunk_size: usize,
    /// Chunk overlap fraction (`CHUNK_OVERLAP_PERCENT`, default 0.10)
    pub chunk_overlap: f32,
    /// BPE encoder name (`TOKENIZER_NAME`, default `cl100k_base`)
    pub tokenizer_name: String,
    /// Embedding model (`EMBEDDING_MODEL`, default `embed-english-v3.0`)
    pub embedding_model: String,
    /// Texts per provider call (`EMBEDDING_BATCH_SIZE`, default 96)
    pub embedding_batch_size: usize,
    /// Soft per-pipeline timeout (`PIPELINE_TIMEOUT_SECS`, default 300)
    pub pipeline_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_api_key: None,
            base_dir: PathBuf::from("./data"),
            max_file_size: 52_428_800,
            vector_storage: StorageFormat::Json,
            log_level: "INFO".to_string(),
            chunk_size: 512,
            chunk_overlap: 0.10,
            tokenizer_name: "cl100k_base".to_string(),
            embedding_model: "embed-english-v3.0".to_string(),
            embedding_batch_size: 96,
            pipeline_timeout: Duration::from_secs(300),
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();

        Ok(Self {
            embedding_api_key: optional("EMBEDDING_API_KEY"),
            base_dir: optional("BASE_DIR").map_or(defaults.base_dir, PathBuf::from),
            max_file_size: parsed("MAX_FILE_SIZE", defaults.max_file_size)?,
            vector_storage: match optional("VECTOR_STORAGE_TYPE") {
                Some(name) => StorageFormat::from_name(&name)
                    .map_err(|e| Error::Config(format!("VECTOR_STORAGE_TYPE: {e}")))?,
                None => defaults.vector_storage,
            },
            log_level: optional("LOG_LEVEL").unwrap_or(defaults.log_level),
            chunk_size: parsed("CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parsed("CHUNK_OVERLAP_PERCENT", defaults.chunk_overlap)?,
            tokenizer_name: optional("TOKENIZER_NAME").unwrap_or(defaults.tokenizer_name),
            embedding_model: optional("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_batch_size: parsed("EMBEDDING_BATCH_SIZE", defaults.embedding_batch_size)?,
            pipeline_timeout: Duration::from_secs(parsed(
                "PIPELINE_TIMEOUT_SECS",
                defaults.pipeline_timeout.as_secs(),
            )?),
        })
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Error> {
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}
