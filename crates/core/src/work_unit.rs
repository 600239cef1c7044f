//! Work-unit identity.
//!
//! Every metadata file becomes one work unit, named after its image-file
//! identifier with the configured file-type suffix stripped, and owning the
//! directory `<processing_directory>/<name>`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::mdoc::AcquisitionHeader;

/// Errors that can occur while deriving a work-unit identity.
#[derive(Debug, Error)]
pub enum WorkUnitError {
    /// The header carries no `ImageFile` entry.
    #[error("Metadata has no ImageFile entry")]
    MissingImageFile,

    /// Stripping the suffix left nothing.
    #[error("Image file identifier '{identifier}' yields an empty work-unit name")]
    EmptyName { identifier: String },

    /// The identifier does not end in the configured suffix (strict mode only).
    #[error("Image file identifier '{identifier}' does not end in '.{suffix}'")]
    SuffixMismatch { identifier: String, suffix: String },

    /// Another metadata file in this run already claimed the name.
    #[error("Work-unit name '{name}' is already used by another metadata file")]
    DuplicateName { name: String },
}

/// A resolved work unit: canonical name and dedicated directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkUnit {
    name: String,
    directory: PathBuf,
}

impl WorkUnit {
    /// The canonical, suffix-stripped name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unit's working directory. Not created by resolution.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// A path inside the unit's directory.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.directory.join(relative)
    }

    /// Creates the unit directory if it does not exist yet.
    pub async fn ensure_directory(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.directory).await
    }
}

/// Derives work units from metadata headers.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    suffix: String,
    root: PathBuf,
    strict: bool,
}

impl IdentityResolver {
    /// `suffix` is given without its leading dot.
    pub fn new(suffix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            suffix: suffix.into(),
            root: root.into(),
            strict: false,
        }
    }

    /// Rejects identifiers that do not carry the suffix instead of using them as-is.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolves the unit for a parsed header.
    pub fn resolve(&self, header: &AcquisitionHeader) -> Result<WorkUnit, WorkUnitError> {
        let identifier = header
            .image_file
            .as_deref()
            .ok_or(WorkUnitError::MissingImageFile)?;
        self.resolve_identifier(identifier)
    }

    /// Resolves the unit for a raw image-file identifier.
    pub fn resolve_identifier(&self, identifier: &str) -> Result<WorkUnit, WorkUnitError> {
        let dotted = format!(".{}", self.suffix);
        let name = match identifier.strip_suffix(&dotted) {
            Some(stripped) => stripped,
            None if self.strict => {
                return Err(WorkUnitError::SuffixMismatch {
                    identifier: identifier.to_string(),
                    suffix: self.suffix.clone(),
                })
            }
            None => {
                warn!(
                    identifier,
                    suffix = %self.suffix,
                    "Image file identifier lacks the configured suffix, using it unchanged"
                );
                identifier
            }
        };

        if name.is_empty() {
            return Err(WorkUnitError::EmptyName {
                identifier: identifier.to_string(),
            });
        }

        Ok(WorkUnit {
            name: name.to_string(),
            directory: self.root.join(name),
        })
    }
}

/// Tracks the names claimed within one run.
#[derive(Debug, Default)]
pub struct NameRegistry {
    claimed: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the unit's name, failing if an earlier unit holds it.
    pub fn claim(&mut self, unit: &WorkUnit) -> Result<(), WorkUnitError> {
        if self.claimed.insert(unit.name.clone()) {
            Ok(())
        } else {
            Err(WorkUnitError::DuplicateName {
                name: unit.name.clone(),
            })
        }
    }
}
