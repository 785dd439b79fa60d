//! Per-run pipeline context.

use std::collections::HashMap;
use std::path::PathBuf;

use libris_core::{DocumentId, EmbeddedChunk, UserId};

use crate::engine::StepResult;

/// Mutable state shared by the steps of one pipeline run.
///
/// The known inter-step hand-offs are typed slots; anything else goes through
/// the string attribute map. Steps only ever add or overwrite slots and
/// record their own result entry; the context is created at run start and
/// discarded with the report.
#[derive(Debug)]
pub struct PipelineContext {
    /// Document being processed
    pub document_id: DocumentId,
    /// Owning user
    pub user_id: UserId,
    /// Filename the document was uploaded under (sanitized)
    pub original_filename: String,
    /// The raw upload on disk
    pub file_path: PathBuf,

    /// Written by Convert: the extracted UTF-8 text file
    pub converted_text_path: Option<PathBuf>,
    /// Written by Chunk: directory holding this document's chunk files
    pub chunks_dir: Option<PathBuf>,
    /// Written by Chunk: number of chunks emitted
    pub chunk_count: Option<usize>,
    /// Written by Chunk: chunk files in emission order
    pub chunk_files: Option<Vec<PathBuf>>,
    /// Written by Embed: ordered embedded chunks
    pub embeddings: Option<Vec<EmbeddedChunk>>,

    /// Free-form extension attributes (detected MIME type, upload
    /// description, storage path)
    pub attributes: HashMap<String, String>,
    /// Per-step results, recorded by the engine
    pub step_results: HashMap<String, StepResult>,
}

impl PipelineContext {
    #[must_use]
    pub fn new(
        document_id: DocumentId,
        user_id: UserId,
        original_filename: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            document_id,
            user_id,
            original_filename: original_filename.into(),
            file_path: file_path.into(),
            converted_text_path: None,
            chunks_dir: None,
            chunk_count: None,
            chunk_files: None,
            embeddings: None,
            attributes: HashMap::new(),
            step_results: HashMap::new(),
        }
    }

    /// Document filename without its extension; used to name derived files.
    #[must_use]
    pub fn file_stem(&self) -> String {
        std::path::Path::new(&self.original_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string()
    }
}
