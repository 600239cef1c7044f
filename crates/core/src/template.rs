//! Job-script templates.
//!
//! Templates are plain text with `{name}` substitution points. `{{` and `}}`
//! produce literal braces, which keeps shell constructs such as `${VAR}`
//! writable as `${{VAR}}`.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while loading or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template file could not be read.
    #[error("Failed to read template {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template names a placeholder no value was supplied for.
    #[error("No value for placeholder '{{{name}}}'")]
    MissingValue { name: String },

    /// A `{` with no closing `}`.
    #[error("Unclosed placeholder starting at byte {offset}")]
    UnclosedPlaceholder { offset: usize },

    /// A lone `}` outside any placeholder.
    #[error("Single '}}' at byte {offset}")]
    UnmatchedBrace { offset: usize },
}

/// Named values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to the display form of `value`.
    pub fn set(mut self, name: &str, value: impl Display) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    /// Sets `name` only when a value is present. An unset name used by the
    /// template fails rendering with [`TemplateError::MissingValue`].
    pub fn set_opt<T: Display>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(name, value),
            None => self,
        }
    }

    pub fn path(self, name: &str, value: &Path) -> Self {
        self.set(name, value.display())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// A loaded template.
#[derive(Debug, Clone)]
pub struct Template {
    text: String,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Reads a template file.
    pub async fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| TemplateError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(text))
    }

    /// Renders the template with `vars`.
    pub fn render(&self, vars: &TemplateVars) -> Result<String, TemplateError> {
        let text = self.text.as_str();
        let mut out = String::with_capacity(text.len());
        let mut chars = text.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        out.push('{');
                        continue;
                    }
                    let start = offset + 1;
                    let end = loop {
                        match chars.next() {
                            Some((i, '}')) => break i,
                            Some((_, '{')) | None => {
                                return Err(TemplateError::UnclosedPlaceholder { offset })
                            }
                            Some(_) => {}
                        }
                    };
                    let name = &text[start..end];
                    let value = vars.get(name).ok_or_else(|| TemplateError::MissingValue {
                        name: name.to_string(),
                    })?;
                    out.push_str(value);
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        out.push('}');
                    } else {
                        return Err(TemplateError::UnmatchedBrace { offset });
                    }
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }
}
