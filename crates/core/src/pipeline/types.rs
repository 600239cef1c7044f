//! Types for the stage sequencer and the run as a whole.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::artifacts::{ArtifactError, ScriptError};
use crate::config::{ConfigError, StagesConfig};
use crate::gate::GateError;
use crate::import::ImportError;
use crate::mdoc::MdocError;
use crate::scheduler::{SchedulerError, SubmissionRecord};
use crate::work_unit::WorkUnitError;

/// Errors that can stop a unit's sequence or the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("metadata error: {0}")]
    Mdoc(#[from] MdocError),

    #[error("work unit error: {0}")]
    WorkUnit(#[from] WorkUnitError),

    #[error("readiness gate error: {0}")]
    Gate(#[from] GateError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("filesystem error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("job script error: {0}")]
    Script(#[from] ScriptError),

    #[error("import error: {0}")]
    Import(#[from] ImportError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The metadata directory could not be listed.
    #[error("failed to scan metadata directory {path}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A unit's task ended without producing a report.
    #[error("task for {unit} did not complete: {reason}")]
    TaskFailed { unit: String, reason: String },
}

/// Which stages run, fixed once at the start of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StagePlan {
    pub file_sorting: bool,
    pub motion_correction: bool,
    pub alignment: bool,
    pub ctf_estimation: bool,
    pub import: bool,
    pub reconstruction: bool,
}

impl StagePlan {
    pub fn from_config(stages: &StagesConfig) -> Self {
        Self {
            file_sorting: stages.file_sorting,
            motion_correction: stages.motion_correction,
            alignment: stages.aretomo_alignment,
            ctf_estimation: stages.ctf_estimation,
            import: stages.relion_tomo_import,
            reconstruction: stages.relion_tomogram_reconstruction,
        }
    }

    /// Whether any stage waits on motion correction.
    pub fn needs_motion_corrected(&self) -> bool {
        self.alignment || self.ctf_estimation
    }
}

/// Where a unit's sequence has got to.
///
/// Stages are optional, so a unit skips the states of disabled stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    Linking,
    AligningInputsPrepared,
    MotionCorrSubmitted,
    WaitingForMotionCorr,
    #[serde(rename = "aretomo_submitted")]
    AreTomoSubmitted,
    CtfSubmitted,
    WaitingForAlignment,
    ImportAssembled,
    ReconstructSubmitted,
    Done,
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Linking => "linking",
            Self::AligningInputsPrepared => "aligning_inputs_prepared",
            Self::MotionCorrSubmitted => "motion_corr_submitted",
            Self::WaitingForMotionCorr => "waiting_for_motion_corr",
            Self::AreTomoSubmitted => "aretomo_submitted",
            Self::CtfSubmitted => "ctf_submitted",
            Self::WaitingForAlignment => "waiting_for_alignment",
            Self::ImportAssembled => "import_assembled",
            Self::ReconstructSubmitted => "reconstruct_submitted",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Everything that happened to one metadata file during a run.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    /// The metadata file.
    pub source: PathBuf,
    /// Canonical name, when resolution got that far.
    pub unit: Option<String>,
    /// Last state reached; `None` if the sequence never started.
    pub state: Option<SequencerState>,
    pub submissions: Vec<SubmissionRecord>,
    /// Why the unit stopped, if it failed.
    pub error: Option<String>,
}

impl UnitReport {
    pub fn new(source: impl Into<PathBuf>, unit: Option<String>) -> Self {
        Self {
            source: source.into(),
            unit,
            state: None,
            submissions: Vec::new(),
            error: None,
        }
    }

    /// A unit rejected before its sequence started.
    pub fn rejected(source: impl Into<PathBuf>, unit: Option<String>, error: &PipelineError) -> Self {
        let mut report = Self::new(source, unit);
        report.error = Some(error.to_string());
        report
    }

    pub fn label(&self) -> String {
        match &self.unit {
            Some(name) => name.clone(),
            None => self.source.display().to_string(),
        }
    }

    pub fn advance(&mut self, state: SequencerState) {
        debug!(unit = %self.label(), %state, "State changed");
        self.state = Some(state);
    }

    pub fn record(&mut self, submission: SubmissionRecord) {
        self.submissions.push(submission);
    }

    pub fn fail(&mut self, error: &PipelineError) {
        self.error = Some(error.to_string());
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// One report per discovered metadata file: launched units in discovery
    /// order, then the files rejected during planning.
    pub units: Vec<UnitReport>,
    /// The import job, when it was submitted.
    pub import: Option<SubmissionRecord>,
    /// Cross-unit failures not attributable to a single unit.
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| !u.succeeded())
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || self.failed_units().next().is_some()
    }

    /// Every submission of the run, per-unit ones first.
    pub fn submissions(&self) -> Vec<&SubmissionRecord> {
        self.units
            .iter()
            .flat_map(|u| u.submissions.iter())
            .chain(self.import.iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_plan_from_config() {
        let stages = StagesConfig {
            file_sorting: true,
            ctf_estimation: true,
            ..Default::default()
        };
        let plan = StagePlan::from_config(&stages);
        assert!(plan.file_sorting);
        assert!(!plan.motion_correction);
        assert!(plan.needs_motion_corrected());
    }

    #[test]
    fn test_report_failure_tracking() {
        let mut report = UnitReport::new("/m/a.mdoc", Some("a".to_string()));
        assert!(report.succeeded());
        report.advance(SequencerState::Linking);
        report.fail(&PipelineError::TaskFailed {
            unit: "a".to_string(),
            reason: "panicked".to_string(),
        });
        assert!(!report.succeeded());
        assert_eq!(report.state, Some(SequencerState::Linking));

        let summary = RunSummary {
            units: vec![report],
            ..Default::default()
        };
        assert!(summary.has_failures());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&SequencerState::WaitingForMotionCorr).unwrap();
        assert_eq!(json, "\"waiting_for_motion_corr\"");
        assert_eq!(SequencerState::AreTomoSubmitted.to_string(), "aretomo_submitted");
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::TaskFailed {
            unit: "Position_1".to_string(),
            reason: "cancelled".to_string(),
        };
        assert_eq!(err.to_string(), "task for Position_1 did not complete: cancelled");
    }

    #[test]
    fn test_rejected_label_falls_back_to_source() {
        let err = PipelineError::Mdoc(MdocError::parse("no sections"));
        let report = UnitReport::rejected("/m/bad.mdoc", None, &err);
        assert_eq!(report.label(), "/m/bad.mdoc");
        assert!(report.state.is_none());
    }
}
