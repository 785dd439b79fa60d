//! Token-window chunking with overlap.

use libris_core::ChunkError;

use crate::tokenizer::Tokenizer;

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkParams {
    /// Window size in tokens
    pub chunk_size: usize,
    /// Fraction of the window shared with the previous chunk
    pub overlap_fraction: f32,
    /// Encoder name, resolved through [`Tokenizer::by_name`]
    pub encoder: String,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap_fraction: 0.10,
            encoder: "cl100k_base".to_string(),
        }
    }
}

impl ChunkParams {
    /// Overlap in tokens: `floor(chunk_size × overlap_fraction)`.
    #[must_use]
    pub fn overlap_tokens(&self) -> usize {
        (self.chunk_size as f32 * self.overlap_fraction).floor() as usize
    }
}

/// Splits text into fixed-size token windows.
#[derive(Debug, Clone)]
pub struct TokenChunker {
    params: ChunkParams,
    tokenizer: Tokenizer,
}

impl TokenChunker {
    /// Build a chunker, validating the parameters and loading the encoder.
    ///
    /// The overlap must leave the window a positive stride, otherwise
    /// chunking would never advance.
    pub fn new(params: ChunkParams) -> Result<Self, ChunkError> {
        if params.chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&params.overlap_fraction) {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap_fraction must be in [0, 1), got {}",
                params.overlap_fraction
            )));
        }
        if params.overlap_tokens() >= params.chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap of {} tokens leaves no stride for chunk_size {}",
                params.overlap_tokens(),
                params.chunk_size
            )));
        }
        let tokenizer = Tokenizer::by_name(&params.encoder)?;
        Ok(Self { params, tokenizer })
    }

    /// The chunker's parameters.
    #[must_use]
    pub fn params(&self) -> &ChunkParams {
        &self.params
    }

    /// The chunker's tokenizer handle.
    #[must_use]
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Split text into decoded chunk strings in emission order.
    ///
    /// Windows are `[start, min(start + S, L))` over the token sequence,
    /// advancing by `S − O`; the final window ends the sequence. Empty input
    /// yields no chunks.
    pub fn split(&self, text: &str) -> Result<Vec<String>, ChunkError> {
        let tokens = self.tokenizer.encode(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let size = self.params.chunk_size;
        let overlap = self.params.overlap_tokens();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + size).min(tokens.len());
            chunks.push(self.tokenizer.decode(&tokens[start..end])?);
            if end >= tokens.len() {
                break;
            }
            start = end - overlap;
        }

        Ok(chunks)
    }
}

/// Chunk filename for a given document stem and sequence index.
///
/// Indices are zero-padded to three digits; the width grows uniformly when a
/// document produces 1000 chunks or more, so lexicographic order always
/// matches emission order.
#[must_use]
pub fn chunk_filename(stem: &str, index: usize, total: usize) -> String {
    let width = 3.max(total.saturating_sub(1).to_string().len());
    format!("{stem}_chunk_{index:0width$}.txt")
}
