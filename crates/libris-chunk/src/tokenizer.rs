//! Named BPE encoder handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;
use tracing::debug;

use libris_core::ChunkError;

/// Process-wide encoder cache. Loading a BPE table parses a sizeable vocab
/// file, so each named encoder is built once and shared read-only.
static ENCODERS: Lazy<Mutex<HashMap<String, Arc<CoreBPE>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// A reversible byte-pair encoder addressed by name.
///
/// Supported names: `cl100k_base` (GPT-4 family, the default),
/// `o200k_base`, `p50k_base`.
#[derive(Clone)]
pub struct Tokenizer {
    name: String,
    bpe: Arc<CoreBPE>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").field("name", &self.name).finish()
    }
}

impl Tokenizer {
    /// Look up (or load and cache) the encoder with the given name.
    pub fn by_name(name: &str) -> Result<Self, ChunkError> {
        let mut cache = ENCODERS
            .lock()
            .map_err(|_| ChunkError::Tokenizer("encoder cache poisoned".to_string()))?;

        if let Some(bpe) = cache.get(name) {
            return Ok(Self {
                name: name.to_string(),
                bpe: Arc::clone(bpe),
            });
        }

        let bpe = match name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            other => {
                return Err(ChunkError::Tokenizer(format!(
                    "unknown encoder '{other}' (supported: cl100k_base, o200k_base, p50k_base)"
                )))
            }
        }
        .map_err(|e| ChunkError::Tokenizer(format!("failed to load encoder '{name}': {e}")))?;

        debug!(encoder = name, "loaded BPE encoder");
        let bpe = Arc::new(bpe);
        cache.insert(name.to_string(), Arc::clone(&bpe));
        Ok(Self {
            name: name.to_string(),
            bpe,
        })
    }

    /// The encoder's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode text to its token sequence. Special tokens are treated as
    /// ordinary text.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.bpe.encode_ordinary(text)
    }

    /// Number of tokens in the text.
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Decode a token slice back to text.
    pub fn decode(&self, tokens: &[usize]) -> Result<String, ChunkError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| ChunkError::Tokenizer(format!("decode failed: {e}")))
    }
}
