//! Error types for the artifacts module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing pipeline artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Failed to create a directory.
    #[error("Failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Something other than the expected link already occupies the path.
    #[error("Path already exists and is not a link to {target}: {path}")]
    LinkExists { path: PathBuf, target: PathBuf },

    /// Failed to create a symbolic link.
    #[error("Failed to link {path} -> {target}")]
    Link {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a file.
    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}
