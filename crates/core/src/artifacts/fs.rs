//! Filesystem helpers shared by the artifact writers.

use std::io;
use std::path::Path;

use tracing::trace;

use super::error::ArtifactError;

/// Result of [`ensure_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// The link already existed with the same target.
    AlreadyPresent,
}

/// Creates `path` and its parents; an existing directory is fine.
pub async fn ensure_dir(path: &Path) -> Result<(), ArtifactError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ArtifactError::create_dir(path, e))
}

/// Creates a symbolic link at `link` pointing to `target`.
///
/// A link already pointing at `target` is left alone. Any other file at
/// `link` is an error; nothing is ever replaced.
pub async fn ensure_link(target: &Path, link: &Path) -> Result<LinkOutcome, ArtifactError> {
    match tokio::fs::symlink_metadata(link).await {
        Ok(meta) => {
            if meta.file_type().is_symlink() {
                if let Ok(existing) = tokio::fs::read_link(link).await {
                    if existing == target {
                        trace!(link = %link.display(), "Link already present");
                        return Ok(LinkOutcome::AlreadyPresent);
                    }
                }
            }
            Err(ArtifactError::LinkExists {
                path: link.to_path_buf(),
                target: target.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            symlink(target, link)
                .await
                .map_err(|source| ArtifactError::Link {
                    path: link.to_path_buf(),
                    target: target.to_path_buf(),
                    source,
                })?;
            Ok(LinkOutcome::Created)
        }
        Err(source) => Err(ArtifactError::read(link, source)),
    }
}

/// Writes `contents` to `path` as a regular file.
///
/// An existing symbolic link at `path` is removed first so the write never
/// lands in the link's target.
pub async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), ArtifactError> {
    if let Ok(meta) = tokio::fs::symlink_metadata(path).await {
        if meta.file_type().is_symlink() {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| ArtifactError::write(path, e))?;
        }
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ArtifactError::write(path, e))
}

pub async fn read_file(path: &Path) -> Result<String, ArtifactError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ArtifactError::read(path, e))
}

#[cfg(unix)]
async fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(not(unix))]
async fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are only supported on unix hosts",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_link_created_then_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("movie.tiff");
        let link = dir.path().join("unit").join("movie.tiff");
        std::fs::write(&target, "frames").unwrap();
        ensure_dir(link.parent().unwrap()).await.unwrap();

        assert_eq!(ensure_link(&target, &link).await.unwrap(), LinkOutcome::Created);
        assert_eq!(
            ensure_link(&target, &link).await.unwrap(),
            LinkOutcome::AlreadyPresent
        );
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "frames");
    }

    #[tokio::test]
    async fn test_link_to_missing_target_is_allowed() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dangling");
        ensure_link(&dir.path().join("not-yet"), &link).await.unwrap();
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_replaced() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("occupied");
        std::fs::write(&link, "keep me").unwrap();

        let err = ensure_link(&dir.path().join("other"), &link).await.unwrap_err();
        assert!(matches!(err, ArtifactError::LinkExists { .. }));
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "keep me");
    }

    #[tokio::test]
    async fn test_link_with_different_target_rejected() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("l");
        ensure_link(&dir.path().join("a"), &link).await.unwrap();
        let err = ensure_link(&dir.path().join("b"), &link).await.unwrap_err();
        assert!(matches!(err, ArtifactError::LinkExists { .. }));
    }

    #[tokio::test]
    async fn test_write_file_replaces_link_not_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("source.tlt");
        let link = dir.path().join("copy.tlt");
        std::fs::write(&target, "original").unwrap();
        ensure_link(&target, &link).await.unwrap();

        write_file(&link, "rewritten").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "original");
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "rewritten");
        assert!(!std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }
}
