//! Per-user directory layout.
//!
//! Every user's data lives under `<base>/<user id>/` in four fixed
//! subdirectories:
//!
//! ```text
//! <base>/<user>/raw_uploads/        uploaded bytes, named {doc_id}_{filename}
//! <base>/<user>/processed_text/     extracted text, named {stem}.txt
//! <base>/<user>/raw_chunks/         chunk files, named {stem}_chunk_{NNN}.txt
//! <base>/<user>/processed_vectors/  persisted sets, named {doc_id}_embeddings.*
//! ```
//!
//! [`LibraryPaths`] is a pure mapping; directory creation happens at the
//! upload boundary.

use std::path::{Path, PathBuf};

use crate::types::UserId;

/// Resolves per-user directories under a base directory.
#[derive(Debug, Clone)]
pub struct LibraryPaths {
    base: PathBuf,
}

impl LibraryPaths {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The configured base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Root directory for one user.
    #[must_use]
    pub fn user_root(&self, user: &UserId) -> PathBuf {
        self.base.join(user.as_str())
    }

    /// Where raw uploaded bytes land.
    #[must_use]
    pub fn raw_uploads(&self, user: &UserId) -> PathBuf {
        self.user_root(user).join("raw_uploads")
    }

    /// Where extracted text files land.
    #[must_use]
    pub fn processed_text(&self, user: &UserId) -> PathBuf {
        self.user_root(user).join("processed_text")
    }

    /// Where chunk files land.
    #[must_use]
    pub fn raw_chunks(&self, user: &UserId) -> PathBuf {
        self.user_root(user).join("raw_chunks")
    }

    /// Where persisted embedding sets land.
    #[must_use]
    pub fn processed_vectors(&self, user: &UserId) -> PathBuf {
        self.user_root(user).join("processed_vectors")
    }

    /// All four per-user directories, in pipeline order.
    #[must_use]
    pub fn all_dirs(&self, user: &UserId) -> [PathBuf; 4] {
        [
            self.raw_uploads(user),
            self.processed_text(user),
            self.raw_chunks(user),
            self.processed_vectors(user),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::parse("alice@example.com").unwrap()
    }

    #[test]
    fn directories_are_namespaced_by_user() {
        let paths = LibraryPaths::new("/data");
        assert_eq!(
            paths.raw_uploads(&user()),
            PathBuf::from("/data/alice@example.com/raw_uploads")
        );
        assert_eq!(
            paths.processed_vectors(&user()),
            PathBuf::from("/data/alice@example.com/processed_vectors")
        );
    }

    #[test]
    fn all_dirs_covers_the_four_stages() {
        let paths = LibraryPaths::new("/data");
        let dirs = paths.all_dirs(&user());
        assert_eq!(dirs.len(), 4);
        assert!(dirs[0].ends_with("raw_uploads"));
        assert!(dirs[1].ends_with("processed_text"));
        assert!(dirs[2].ends_with("raw_chunks"));
        assert!(dirs[3].ends_with("processed_vectors"));
    }

    #[test]
    fn resolution_is_pure() {
        let paths = LibraryPaths::new("/nonexistent/base");
        // Resolving paths never touches the filesystem.
        let dir = paths.raw_chunks(&user());
        assert!(!dir.exists());
    }
}
