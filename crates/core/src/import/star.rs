//! The tomogram descriptor table read by the RELION import job.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::artifacts::{read_file, write_file, ArtifactError};
use crate::config::format_float;

const HEADER: &str = "data_

loop_
_rlnTomoName
_rlnTomoTiltSeriesName
_rlnTomoImportCtfFindFile
_rlnTomoImportImodDir
_rlnTomoImportFractionalDose
_rlnTomoImportOrderList
_rlnTomoImportCulledFile

";

const SEPARATOR: &str = "   ";

/// One tomogram's row. Paths are relative to the import tree root.
#[derive(Debug, Clone, PartialEq)]
pub struct StarRow {
    pub name: String,
    /// Total dose of one tilt: frames per tilt times dose per frame.
    pub fractional_dose: f64,
}

impl StarRow {
    pub fn new(name: impl Into<String>, fractional_dose: f64) -> Self {
        Self {
            name: name.into(),
            fractional_dose,
        }
    }

    pub fn to_line(&self) -> String {
        let n = &self.name;
        let columns = [
            n.clone(),
            format!("tomograms/{n}/{n}.st"),
            format!("tomograms/{n}/{n}.txt"),
            format!("tomograms/{n}"),
            format_float(self.fractional_dose),
            format!("tomograms/{n}/{n}_order_list.csv"),
            format!("tomograms/{n}/{n}_culled_file.mrc"),
        ];
        columns.join(SEPARATOR)
    }
}

/// Append-only writer for `tomograms_descr.star`.
#[derive(Debug, Clone)]
pub struct StarFile {
    path: PathBuf,
}

impl StarFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `row`, writing the header first when the file is new.
    /// Returns false when a row for the same tomogram is already present.
    pub async fn append(&self, row: &StarRow) -> Result<bool, ArtifactError> {
        let mut contents = match tokio::fs::try_exists(&self.path).await {
            Ok(true) => read_file(&self.path).await?,
            Ok(false) => HEADER.to_string(),
            Err(e) => return Err(ArtifactError::read(&self.path, e)),
        };

        if contains_row(&contents, &row.name) {
            debug!(unit = %row.name, "Descriptor row already present");
            return Ok(false);
        }

        contents.push_str(&row.to_line());
        contents.push('\n');
        write_file(&self.path, contents).await?;
        info!(unit = %row.name, star = %self.path.display(), "Descriptor row written");
        Ok(true)
    }
}

fn contains_row(contents: &str, name: &str) -> bool {
    contents
        .lines()
        .filter(|line| !line.starts_with('_'))
        .any(|line| line.split_whitespace().next() == Some(name))
}
