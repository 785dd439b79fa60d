//! Columnar compressed binary storage.
//!
//! One file per embedding set, extension `.h5`, laid out as named datasets
//! with a top-level attribute block:
//!
//! ```text
//! magic "LCOL" | version u16
//! attrs: u32 length + JSON {file_id, embedding_count, embedding_dimension,
//!                           storage_format: "hdf5", metadata: {…}}
//! 5 × dataset block:
//!   name (u16 length + bytes)
//!   raw length u64 | crc32 of compressed bytes u32 | compressed length u64
//!   compressed bytes (gzip, maximum level)
//! ```
//!
//! Dataset payloads:
//!
//! | Dataset | Encoding |
//! |---------|----------|
//! | `embeddings` | N×D float32 little-endian, byte-shuffled before compression |
//! | `texts`, `filenames`, `embedding_models` | u32-length-prefixed UTF-8 strings |
//! | `token_counts` | int32 little-endian |
//!
//! The byte-shuffle pre-filter groups the matrix bytes by byte plane, which
//! compresses float data markedly better than the interleaved layout. Every
//! block carries a CRC32 so corruption surfaces as [`StoreError::Corrupt`]
//! instead of garbage vectors.

use std::io::{Read, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use libris_core::{
    DocumentId, EmbeddedChunk, EmbeddingSet, EmbeddingStore, SetMetadata, StorageFormat,
    StoreError,
};

use crate::{document_id_of, format_of, vector_filename};

const MAGIC: &[u8; 4] = b"LCOL";
const VERSION: u16 = 1;

const DS_EMBEDDINGS: &str = "embeddings";
const DS_TEXTS: &str = "texts";
const DS_FILENAMES: &str = "filenames";
const DS_TOKEN_COUNTS: &str = "token_counts";
const DS_MODELS: &str = "embedding_models";

/// Columnar compressed storage for embedding sets.
pub struct ColumnarStore {
    dir: PathBuf,
}

impl ColumnarStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, document_id: &DocumentId) -> PathBuf {
        self.dir.join(vector_filename(document_id, StorageFormat::Hdf5))
    }
}

/// Top-level attribute block.
#[derive(Serialize, Deserialize)]
struct Attrs {
    file_id: DocumentId,
    embedding_count: usize,
    embedding_dimension: usize,
    storage_format: String,
    metadata: SetMetadata,
}

#[async_trait]
impl EmbeddingStore for ColumnarStore {
    fn format(&self) -> StorageFormat {
        StorageFormat::Hdf5
    }

    async fn save(&self, set: &EmbeddingSet) -> Result<PathBuf, StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&set.document_id);
        let set = set.clone();

        // Compression at the maximum level is CPU-bound.
        let written = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, StoreError> {
            encode_set(&set)
        })
        .await
        .map_err(|e| StoreError::Persist(format!("encode task failed: {e}")))??;

        let tmp = path.with_extension("h5.tmp");
        tokio::fs::write(&tmp, &written).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), bytes = written.len(), "persisted columnar set");
        Ok(path)
    }

    async fn load(&self, document_id: &DocumentId) -> Result<EmbeddingSet, StoreError> {
        let path = self.path_for(document_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    document_id: document_id.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;

        let expected = *document_id;
        let set = tokio::task::spawn_blocking(move || decode_set(&bytes))
            .await
            .map_err(|e| StoreError::Persist(format!("decode task failed: {e}")))??;

        if set.document_id != expected {
            return Err(StoreError::Corrupt(format!(
                "set at {} claims id {}",
                path.display(),
                set.document_id
            )));
        }
        Ok(set)
    }

    async fn exists(&self, document_id: &DocumentId) -> bool {
        self.path_for(document_id).exists()
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<bool, StoreError> {
        let path = self.path_for(document_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<DocumentId>, StoreError> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if format_of(&path) == Some(StorageFormat::Hdf5) {
                if let Some(id) = document_id_of(&path) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn encode_set(set: &EmbeddingSet) -> Result<Vec<u8>, StoreError> {
    let dimension = set.dimension().unwrap_or(0);
    for (i, chunk) in set.chunks.iter().enumerate() {
        if chunk.embedding.len() != dimension {
            return Err(StoreError::Persist(format!(
                "chunk {i} has dimension {}, set dimension is {dimension}",
                chunk.embedding.len()
            )));
        }
    }

    let attrs = Attrs {
        file_id: set.document_id,
        embedding_count: set.chunks.len(),
        embedding_dimension: dimension,
        storage_format: StorageFormat::Hdf5.as_str().to_string(),
        metadata: set.metadata.clone(),
    };
    let attrs_json = serde_json::to_vec(&attrs)?;

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(attrs_json.len() as u32).to_le_bytes());
    out.extend_from_slice(&attrs_json);

    let mut matrix = Vec::with_capacity(set.chunks.len() * dimension * 4);
    for chunk in &set.chunks {
        for value in &chunk.embedding {
            matrix.extend_from_slice(&value.to_le_bytes());
        }
    }
    write_dataset(&mut out, DS_EMBEDDINGS, &byte_shuffle(&matrix, 4))?;
    write_dataset(
        &mut out,
        DS_TEXTS,
        &encode_strings(set.chunks.iter().map(|c| c.text.as_str())),
    )?;
    write_dataset(
        &mut out,
        DS_FILENAMES,
        &encode_strings(set.chunks.iter().map(|c| c.filename.as_str())),
    )?;
    let mut counts = Vec::with_capacity(set.chunks.len() * 4);
    for chunk in &set.chunks {
        counts.extend_from_slice(&(chunk.token_count as i32).to_le_bytes());
    }
    write_dataset(&mut out, DS_TOKEN_COUNTS, &counts)?;
    write_dataset(
        &mut out,
        DS_MODELS,
        &encode_strings(set.chunks.iter().map(|c| c.embedding_model.as_str())),
    )?;

    Ok(out)
}

fn write_dataset(out: &mut Vec<u8>, name: &str, raw: &[u8]) -> Result<(), StoreError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(raw)
        .and_then(|()| encoder.finish())
        .map(|compressed| {
            let crc = crc32fast::hash(&compressed);
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&(raw.len() as u64).to_le_bytes());
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&(compressed.len() as u64).to_le_bytes());
            out.extend_from_slice(&compressed);
        })
        .map_err(|e| StoreError::Persist(format!("compression failed: {e}")))
}

fn encode_strings<'a>(strings: impl Iterator<Item = &'a str>) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strings {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }
    out
}

/// Byte-shuffle pre-filter: regroup an array of `width`-byte elements into
/// `width` planes of same-significance bytes.
fn byte_shuffle(data: &[u8], width: usize) -> Vec<u8> {
    let count = data.len() / width;
    let mut out = vec![0u8; data.len()];
    for i in 0..count {
        for plane in 0..width {
            out[plane * count + i] = data[i * width + plane];
        }
    }
    out
}

/// Inverse of [`byte_shuffle`].
fn byte_unshuffle(data: &[u8], width: usize) -> Vec<u8> {
    let count = data.len() / width;
    let mut out = vec![0u8; data.len()];
    for i in 0..count {
        for plane in 0..width {
            out[i * width + plane] = data[plane * count + i];
        }
    }
    out
}

// ============================================================================
// Decoding
// ============================================================================

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], StoreError> {
        if self.pos + n > self.data.len() {
            return Err(StoreError::Corrupt("truncated columnar file".to_string()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, StoreError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, StoreError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, StoreError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    fn done(&self) -> bool {
        self.pos >= self.data.len()
    }
}

fn decode_set(bytes: &[u8]) -> Result<EmbeddingSet, StoreError> {
    let mut cursor = Cursor { data: bytes, pos: 0 };

    if cursor.take(4)? != MAGIC {
        return Err(StoreError::Corrupt("not a columnar set file".to_string()));
    }
    let version = cursor.u16()?;
    if version != VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported columnar version {version}"
        )));
    }

    let attrs_len = cursor.u32()? as usize;
    let attrs: Attrs = serde_json::from_slice(cursor.take(attrs_len)?)?;

    let mut embeddings = None;
    let mut texts = None;
    let mut filenames = None;
    let mut token_counts = None;
    let mut models = None;

    while !cursor.done() {
        let name_len = cursor.u16()? as usize;
        let name = String::from_utf8(cursor.take(name_len)?.to_vec())
            .map_err(|_| StoreError::Corrupt("dataset name is not UTF-8".to_string()))?;
        let raw_len = cursor.u64()? as usize;
        let crc = cursor.u32()?;
        let comp_len = cursor.u64()? as usize;
        let compressed = cursor.take(comp_len)?;

        if crc32fast::hash(compressed) != crc {
            return Err(StoreError::Corrupt(format!(
                "checksum mismatch in dataset '{name}'"
            )));
        }

        let mut raw = Vec::with_capacity(raw_len);
        GzDecoder::new(compressed)
            .read_to_end(&mut raw)
            .map_err(|e| StoreError::Corrupt(format!("dataset '{name}' decompression: {e}")))?;
        if raw.len() != raw_len {
            return Err(StoreError::Corrupt(format!(
                "dataset '{name}' expected {raw_len} bytes, got {}",
                raw.len()
            )));
        }

        match name.as_str() {
            DS_EMBEDDINGS => embeddings = Some(raw),
            DS_TEXTS => texts = Some(raw),
            DS_FILENAMES => filenames = Some(raw),
            DS_TOKEN_COUNTS => token_counts = Some(raw),
            DS_MODELS => models = Some(raw),
            // Unknown datasets from newer writers are skipped.
            _ => {}
        }
    }

    let missing = |name: &str| StoreError::Corrupt(format!("missing dataset '{name}'"));
    let embeddings = embeddings.ok_or_else(|| missing(DS_EMBEDDINGS))?;
    let texts = decode_strings(&texts.ok_or_else(|| missing(DS_TEXTS))?)?;
    let filenames = decode_strings(&filenames.ok_or_else(|| missing(DS_FILENAMES))?)?;
    let counts_raw = token_counts.ok_or_else(|| missing(DS_TOKEN_COUNTS))?;
    let models = decode_strings(&models.ok_or_else(|| missing(DS_MODELS))?)?;

    let n = attrs.embedding_count;
    let dim = attrs.embedding_dimension;
    if texts.len() != n || filenames.len() != n || models.len() != n || counts_raw.len() != n * 4 {
        return Err(StoreError::Corrupt(
            "dataset lengths disagree with embedding_count".to_string(),
        ));
    }
    if embeddings.len() != n * dim * 4 {
        return Err(StoreError::Corrupt(format!(
            "embeddings dataset has {} bytes, expected {}",
            embeddings.len(),
            n * dim * 4
        )));
    }

    let matrix = byte_unshuffle(&embeddings, 4);
    let mut chunks = Vec::with_capacity(n);
    for i in 0..n {
        let mut vector = Vec::with_capacity(dim);
        for j in 0..dim {
            let off = (i * dim + j) * 4;
            vector.push(f32::from_le_bytes([
                matrix[off],
                matrix[off + 1],
                matrix[off + 2],
                matrix[off + 3],
            ]));
        }
        let count_off = i * 4;
        let token_count = i32::from_le_bytes([
            counts_raw[count_off],
            counts_raw[count_off + 1],
            counts_raw[count_off + 2],
            counts_raw[count_off + 3],
        ]);

        chunks.push(EmbeddedChunk {
            filename: filenames[i].clone(),
            text: texts[i].clone(),
            token_count: token_count.max(0) as usize,
            embedding: vector,
            embedding_model: models[i].clone(),
        });
    }

    Ok(EmbeddingSet {
        document_id: attrs.file_id,
        chunks,
        metadata: attrs.metadata,
    })
}

fn decode_strings(data: &[u8]) -> Result<Vec<String>, StoreError> {
    let mut cursor = Cursor { data, pos: 0 };
    let mut out = Vec::new();
    while !cursor.done() {
        let len = cursor.u32()? as usize;
        let bytes = cursor.take(len)?;
        out.push(
            String::from_utf8(bytes.to_vec())
                .map_err(|_| StoreError::Corrupt("string column is not UTF-8".to_string()))?,
        );
    }
    Ok(out)
}
