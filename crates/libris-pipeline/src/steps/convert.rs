//! File conversion step.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use libris_core::{Error, LibraryPaths};
use libris_extract::{detect_mime, ExtractorRegistry};

use crate::context::PipelineContext;
use crate::engine::PipelineStep;

/// Converts the raw upload into a UTF-8 text file at
/// `processed_text/{stem}.txt`.
pub struct ConvertStep {
    extractors: Arc<ExtractorRegistry>,
    paths: LibraryPaths,
}

impl ConvertStep {
    #[must_use]
    pub fn new(extractors: Arc<ExtractorRegistry>, paths: LibraryPaths) -> Self {
        Self { extractors, paths }
    }
}

#[async_trait]
impl PipelineStep for ConvertStep {
    fn name(&self) -> &str {
        "file_conversion"
    }

    fn max_retries(&self) -> u32 {
        2
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<String, Error> {
        // The gate records the detected MIME type; sniff again if this run
        // was started outside it.
        let mime_type = match context.attributes.get("mime_type") {
            Some(mime) => mime.clone(),
            None => {
                let head = read_head(&context.file_path).await?;
                let detected = detect_mime(&head, &context.original_filename);
                context
                    .attributes
                    .insert("mime_type".to_string(), detected.clone());
                detected
            }
        };

        debug!(
            document_id = %context.document_id,
            mime_type = %mime_type,
            "converting {}",
            context.original_filename
        );

        let text = self
            .extractors
            .extract(&context.file_path, &mime_type)
            .await?;

        let out_dir = self.paths.processed_text(&context.user_id);
        tokio::fs::create_dir_all(&out_dir).await.map_err(Error::Io)?;
        let out_path = out_dir.join(format!("{}.txt", context.file_stem()));

        if let Err(e) = tokio::fs::write(&out_path, text.as_bytes()).await {
            // Never leave a half-written text file behind.
            let _ = tokio::fs::remove_file(&out_path).await;
            return Err(Error::Io(e));
        }

        context.converted_text_path = Some(out_path.clone());
        Ok(format!("file converted to {}", out_path.display()))
    }
}

async fn read_head(path: &std::path::Path) -> Result<Vec<u8>, Error> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await.map_err(Error::Io)?;
    let mut head = vec![0u8; 8192];
    let mut filled = 0;
    loop {
        let n = file.read(&mut head[filled..]).await.map_err(Error::Io)?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == head.len() {
            break;
        }
    }
    head.truncate(filled);
    Ok(head)
}
