//! Error types for metadata parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading an mdoc file.
#[derive(Debug, Error)]
pub enum MdocError {
    /// The file could not be read.
    #[error("Failed to read metadata file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text is not a usable metadata record.
    #[error("Failed to parse metadata: {reason}")]
    Parse { reason: String },

    /// A tilt section lacks one of its required fields.
    #[error("Tilt section ZValue = {segment} is missing required field {field}")]
    MissingField { field: &'static str, segment: i64 },
}

impl MdocError {
    /// Creates a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }
}
