//! Pipeline stages that end in a cluster job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A submitted pipeline step, each backed by one external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MotionCorrection,
    Alignment,
    CtfEstimation,
    Import,
    Reconstruction,
}

impl Stage {
    /// Human-readable name used in log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::MotionCorrection => "Motion Correction",
            Stage::Alignment => "AreTomo",
            Stage::CtfEstimation => "CtfFind",
            Stage::Import => "RELION Import",
            Stage::Reconstruction => "RELION reconstruct tomogram",
        }
    }

    /// File-name prefix of the rendered job script.
    pub fn script_prefix(&self) -> &'static str {
        match self {
            Stage::MotionCorrection => "motioncorr_slurm",
            Stage::Alignment => "aretomo_slurm",
            Stage::CtfEstimation => "ctffind_slurm",
            Stage::Import => "relion_import",
            Stage::Reconstruction => "relion_tomo_reconstruct",
        }
    }

    /// Job-script file name for a unit.
    pub fn script_name(&self, unit: &str) -> String {
        match self {
            Stage::Import => format!("{}.sh", self.script_prefix()),
            _ => format!("{}_{}.sh", self.script_prefix(), unit),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
