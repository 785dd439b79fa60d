//! Streaming upload gate.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use libris_core::{DocumentId, LibraryPaths, UploadError, UploadReceipt, UserId};
use libris_extract::{allowed_mime_types, detect_mime};

use crate::queue::{IngestJob, IngestSender};

const STREAM_BUFFER: usize = 8 * 1024;

/// Upload gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Upload byte cap
    pub max_file_size: u64,
    /// Accepted MIME types
    pub allowed_types: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_file_size: 52_428_800,
            allowed_types: allowed_mime_types()
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }
}

/// Accepts uploads: validates the user id, streams bytes to disk under the
/// size cap, validates the detected MIME type, and enqueues background
/// ingest.
///
/// The document id is assigned before the write but only revealed to the
/// caller once the bytes are durable; on any failure the partial raw file is
/// unlinked, so `raw_uploads/` only ever holds complete uploads.
pub struct UploadGate {
    paths: LibraryPaths,
    config: GateConfig,
    submitter: Option<IngestSender>,
}

impl UploadGate {
    #[must_use]
    pub fn new(paths: LibraryPaths, config: GateConfig) -> Self {
        Self {
            paths,
            config,
            submitter: None,
        }
    }

    /// Attach the ingest queue; accepted uploads get enqueued.
    #[must_use]
    pub fn with_queue(mut self, submitter: IngestSender) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Accept one upload from a byte stream.
    pub async fn accept<R: AsyncRead + Unpin>(
        &self,
        mut source: R,
        claimed_filename: &str,
        user: &str,
        description: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        let user = UserId::parse(user)?;

        for dir in self.paths.all_dirs(&user) {
            tokio::fs::create_dir_all(&dir).await?;
        }

        let document_id = DocumentId::generate();
        let filename = sanitize_filename(claimed_filename);
        let dest = self
            .paths
            .raw_uploads(&user)
            .join(format!("{document_id}_{filename}"));

        let mut file = tokio::fs::File::create(&dest).await?;
        let mut buf = vec![0u8; STREAM_BUFFER];
        let mut head = Vec::with_capacity(STREAM_BUFFER);
        let mut written: u64 = 0;

        loop {
            let n = match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&dest).await;
                    return Err(UploadError::Io(e));
                }
            };

            written += n as u64;
            if written > self.config.max_file_size {
                drop(file);
                let _ = tokio::fs::remove_file(&dest).await;
                debug!(user = %user, size = written, "rejected oversize upload");
                return Err(UploadError::TooLarge {
                    size: written,
                    limit: self.config.max_file_size,
                });
            }

            if head.len() < STREAM_BUFFER {
                let take = n.min(STREAM_BUFFER - head.len());
                head.extend_from_slice(&buf[..take]);
            }

            if let Err(e) = file.write_all(&buf[..n]).await {
                drop(file);
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(UploadError::Io(e));
            }
        }

        if let Err(e) = file.flush().await {
            drop(file);
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(UploadError::Io(e));
        }
        drop(file);

        let mime_type = detect_mime(&head, &filename);
        if !self.config.allowed_types.iter().any(|m| m == &mime_type) {
            let _ = tokio::fs::remove_file(&dest).await;
            debug!(user = %user, mime_type = %mime_type, "rejected unsupported upload");
            return Err(UploadError::UnsupportedType(mime_type));
        }

        let queued = match &self.submitter {
            Some(submitter) => {
                submitter
                    .submit(IngestJob {
                        document_id,
                        user_id: user.clone(),
                        original_filename: filename.clone(),
                        file_path: dest.clone(),
                        mime_type: mime_type.clone(),
                        description: description.map(str::to_string),
                    })
                    .await
            }
            None => false,
        };

        info!(
            user = %user,
            document_id = %document_id,
            size = written,
            mime_type = %mime_type,
            queued,
            "accepted upload {filename}"
        );

        Ok(UploadReceipt {
            document_id,
            original_filename: filename,
            size_bytes: written,
            mime_type,
            queued,
        })
    }
}

/// Reduce a claimed filename to a safe final path component.
fn sanitize_filename(claimed: &str) -> String {
    let name = claimed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(claimed)
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn gate(tmp: &std::path::Path) -> UploadGate {
        UploadGate::new(LibraryPaths::new(tmp), GateConfig::default())
    }

    fn uploads_in(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        if !dir.exists() {
            return vec![];
        }
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect()
    }

    #[tokio::test]
    async fn accepts_a_text_upload() {
        let tmp = tempdir().unwrap();
        let gate = gate(tmp.path());

        let receipt = gate
            .accept(&b"hello world"[..], "hi.txt", "u2@x.io", None)
            .await
            .unwrap();

        assert_eq!(receipt.size_bytes, 11);
        assert_eq!(receipt.mime_type, "text/plain");
        assert_eq!(receipt.original_filename, "hi.txt");
        assert!(!receipt.queued);

        let user = UserId::parse("u2@x.io").unwrap();
        let uploads = uploads_in(&LibraryPaths::new(tmp.path()).raw_uploads(&user));
        assert_eq!(uploads.len(), 1);
        let name = uploads[0].file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, format!("{}_hi.txt", receipt.document_id));
        assert_eq!(std::fs::read(&uploads[0]).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn invalid_user_fails_before_any_disk_io() {
        let tmp = tempdir().unwrap();
        let gate = gate(tmp.path());

        let err = gate
            .accept(&b"x"[..], "hi.txt", "not-an-email", None)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidUser(_)));
        assert!(uploads_in(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn oversize_upload_leaves_no_file() {
        let tmp = tempdir().unwrap();
        let gate = UploadGate::new(
            LibraryPaths::new(tmp.path()),
            GateConfig {
                max_file_size: 1024,
                ..Default::default()
            },
        );

        let body = vec![b'a'; 4096];
        let err = gate
            .accept(body.as_slice(), "big.txt", "u@x.io", None)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::TooLarge { limit: 1024, .. }));
        let user = UserId::parse("u@x.io").unwrap();
        assert!(uploads_in(&LibraryPaths::new(tmp.path()).raw_uploads(&user)).is_empty());
    }

    #[tokio::test]
    async fn unsupported_type_leaves_no_file() {
        let tmp = tempdir().unwrap();
        let gate = gate(tmp.path());

        let png = [0x89u8, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let err = gate
            .accept(&png[..], "image.png", "u@x.io", None)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::UnsupportedType(_)));
        let user = UserId::parse("u@x.io").unwrap();
        assert!(uploads_in(&LibraryPaths::new(tmp.path()).raw_uploads(&user)).is_empty());
    }

    #[tokio::test]
    async fn creates_the_four_user_directories() {
        let tmp = tempdir().unwrap();
        let gate = gate(tmp.path());
        gate.accept(&b"text"[..], "a.txt", "u@x.io", None)
            .await
            .unwrap();

        let paths = LibraryPaths::new(tmp.path());
        let user = UserId::parse("u@x.io").unwrap();
        for dir in paths.all_dirs(&user) {
            assert!(dir.is_dir(), "{dir:?} missing");
        }
    }

    #[tokio::test]
    async fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("  "), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename("plain.txt"), "plain.txt");
    }

    #[tokio::test]
    async fn exact_limit_is_accepted() {
        let tmp = tempdir().unwrap();
        let gate = UploadGate::new(
            LibraryPaths::new(tmp.path()),
            GateConfig {
                max_file_size: 11,
                ..Default::default()
            },
        );
        let receipt = gate
            .accept(&b"hello world"[..], "hi.txt", "u@x.io", None)
            .await
            .unwrap();
        assert_eq!(receipt.size_bytes, 11);
    }
}
