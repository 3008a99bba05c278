//! # Media Handles
//!
//! Locators handed to presentation code for playable media. A handle is
//! either a stable remote URL or a temporary local file materialized from
//! the cache. The local form owns its file: callers release the handle when
//! the consuming player is torn down, and dropping it unreleased still
//! deletes the file but logs the omission as a caller bug.

use std::path::Path;

use tempfile::TempPath;
use tracing::warn;

/// Locator for one playable media resource. Single-owner: a handle is never
/// shared between two consumers.
#[derive(Debug)]
pub struct MediaHandle {
    kind: HandleKind,
}

#[derive(Debug)]
enum HandleKind {
    Remote(String),
    Materialized { path: Option<TempPath> },
}

impl MediaHandle {
    /// Stable remote locator; nothing to release.
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            kind: HandleKind::Remote(url.into()),
        }
    }

    /// Handle owning a materialized temporary file.
    pub(crate) fn materialized(path: TempPath) -> Self {
        Self {
            kind: HandleKind::Materialized { path: Some(path) },
        }
    }

    /// Whether this handle owns a local temporary file.
    pub fn is_materialized(&self) -> bool {
        matches!(self.kind, HandleKind::Materialized { .. })
    }

    /// The playable location: a URL, or the path of the materialized file.
    pub fn location(&self) -> String {
        match &self.kind {
            HandleKind::Remote(url) => url.clone(),
            HandleKind::Materialized { path } => path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Filesystem path of the materialized file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            HandleKind::Remote(_) => None,
            HandleKind::Materialized { path } => path.as_deref(),
        }
    }

    /// Release the handle, deleting the materialized file now.
    pub fn release(mut self) {
        if let HandleKind::Materialized { path } = &mut self.kind {
            if let Some(path) = path.take() {
                if let Err(e) = path.close() {
                    warn!(error = %e, "Failed to remove materialized media file");
                }
            }
        }
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        if let HandleKind::Materialized { path } = &mut self.kind {
            if let Some(path) = path.take() {
                warn!(path = ?path, "Materialized media handle dropped without release");
                // TempPath removes the file when it drops here.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn materialized_handle(contents: &[u8]) -> MediaHandle {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        MediaHandle::materialized(file.into_temp_path())
    }

    #[test]
    fn test_remote_handle_has_no_file() {
        let handle = MediaHandle::remote("https://cdn.example.com/intro.mp4");
        assert!(!handle.is_materialized());
        assert!(handle.path().is_none());
        assert_eq!(handle.location(), "https://cdn.example.com/intro.mp4");
        handle.release();
    }

    #[test]
    fn test_release_removes_materialized_file() {
        let handle = materialized_handle(b"frames");
        let path = handle.path().unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(handle.location(), path.display().to_string());

        handle.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_file_as_backstop() {
        let handle = materialized_handle(b"frames");
        let path = handle.path().unwrap().to_path_buf();
        assert!(path.exists());

        drop(handle);
        assert!(!path.exists());
    }
}
