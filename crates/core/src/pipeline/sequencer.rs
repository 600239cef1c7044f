//! Per-unit stage sequencer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::types::{PipelineError, SequencerState, StagePlan, UnitReport};
use crate::artifacts::{link_subframes, write_tilt_files, ScriptWriter, UnitPaths};
use crate::config::Config;
use crate::gate::{ReadinessGate, StageArtifact};
use crate::mdoc::TiltSeries;
use crate::scheduler::AdmissionController;
use crate::stage::Stage;
use crate::work_unit::WorkUnit;

/// Collaborators shared by every unit of a run.
#[derive(Clone)]
pub struct SequencerContext {
    pub config: Arc<Config>,
    pub plan: StagePlan,
    pub admission: Arc<AdmissionController>,
    pub gate: ReadinessGate,
    pub scripts: ScriptWriter,
}

impl SequencerContext {
    fn settle(&self) -> Duration {
        Duration::from_millis(self.config.gate.settle_ms)
    }
}

/// Drives one work unit through its per-unit stages:
///
/// 1. link the sub-frame movies and write the tilt inputs (file sorting)
/// 2. submit motion correction
/// 3. wait for the motion-correction marker, then submit alignment and CTF
///    estimation
pub struct UnitSequencer {
    ctx: SequencerContext,
    source: PathBuf,
    unit: WorkUnit,
    series: Arc<TiltSeries>,
}

impl UnitSequencer {
    pub fn new(
        ctx: SequencerContext,
        source: PathBuf,
        unit: WorkUnit,
        series: Arc<TiltSeries>,
    ) -> Self {
        Self {
            ctx,
            source,
            unit,
            series,
        }
    }

    /// Runs the sequence. Errors stop this unit only and are recorded in
    /// the returned report.
    pub async fn run(self) -> UnitReport {
        let mut report = UnitReport::new(self.source.clone(), Some(self.unit.name().to_string()));
        if let Err(e) = self.execute(&mut report).await {
            error!(unit = %self.unit.name(), error = %e, "Unit sequence stopped");
            report.fail(&e);
        }
        report
    }

    async fn execute(&self, report: &mut UnitReport) -> Result<(), PipelineError> {
        let ctx = &self.ctx;
        let name = self.unit.name();
        let paths = UnitPaths::new(&self.unit);

        if ctx.plan.file_sorting {
            report.advance(SequencerState::Linking);
            link_subframes(&self.series, &ctx.config.paths.mdoc_directory, &paths).await?;
            write_tilt_files(&self.series, &paths, &ctx.config.acquisition.file_type).await?;
            report.advance(SequencerState::AligningInputsPrepared);
        }

        if ctx.plan.motion_correction {
            self.submit(report, Stage::MotionCorrection, &paths).await?;
            report.advance(SequencerState::MotionCorrSubmitted);
        }

        if ctx.plan.needs_motion_corrected() {
            report.advance(SequencerState::WaitingForMotionCorr);
            let waiter = if ctx.plan.alignment { "AreTomo" } else { "CtfFind" };
            let marker = StageArtifact::file(paths.motioncorr_marker());
            let outcome = ctx.gate.wait(name, waiter, &marker).await?;
            info!(unit = name, waited = outcome.waited, "Motion-corrected movies are ready");

            let settle = ctx.settle();
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }

            if ctx.plan.alignment {
                self.submit(report, Stage::Alignment, &paths).await?;
                report.advance(SequencerState::AreTomoSubmitted);
            }
            if ctx.plan.ctf_estimation {
                self.submit(report, Stage::CtfEstimation, &paths).await?;
                report.advance(SequencerState::CtfSubmitted);
            }
        }

        Ok(())
    }

    async fn submit(
        &self,
        report: &mut UnitReport,
        stage: Stage,
        paths: &UnitPaths,
    ) -> Result<(), PipelineError> {
        let script = self.ctx.scripts.write_unit_script(stage, paths).await?;
        let record = self
            .ctx
            .admission
            .submit(self.unit.name(), stage, &script)
            .await?;
        report.record(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagesConfig;
    use crate::scheduler::SchedulerError;
    use crate::testing::{fixtures, MockScheduler};
    use crate::work_unit::IdentityResolver;
    use tempfile::TempDir;

    fn context(config: Config, mock: &MockScheduler) -> SequencerContext {
        let config = Arc::new(config);
        SequencerContext {
            plan: StagePlan::from_config(&config.stages),
            admission: Arc::new(AdmissionController::from_config(
                Arc::new(mock.clone()),
                &config.scheduler,
            )),
            gate: ReadinessGate::from_config(&config.gate),
            scripts: ScriptWriter::new(config.clone()),
            config,
        }
    }

    fn sequencer(ctx: SequencerContext) -> UnitSequencer {
        let series = crate::mdoc::parse_mdoc(
            &fixtures::mdoc_text("Position_1.mrc", &[(10.0, 8), (-10.0, 8), (0.0, 8)]),
            &Default::default(),
        )
        .unwrap();
        let unit = IdentityResolver::new("mrc", &ctx.config.paths.processing_directory)
            .resolve(&series.header)
            .unwrap();
        UnitSequencer::new(ctx, PathBuf::from("Position_1.mrc.mdoc"), unit, Arc::new(series))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_per_unit_sequence() {
        let root = TempDir::new().unwrap();
        let mut config = fixtures::config(root.path());
        fixtures::install_templates(&mut config, root.path());
        config.stages = StagesConfig {
            file_sorting: true,
            motion_correction: true,
            aretomo_alignment: true,
            ctf_estimation: true,
            ..Default::default()
        };
        let unit_dir = config.paths.processing_directory.join("Position_1");
        let mock = MockScheduler::new();
        mock.create_on_submit(
            "motioncorr_slurm_Position_1",
            unit_dir.join("MotionCorr/job002/RELION_JOB_EXIT_SUCCESS"),
        )
        .await;

        let report = sequencer(context(config, &mock)).run().await;

        assert!(report.succeeded(), "{:?}", report.error);
        assert_eq!(report.state, Some(SequencerState::CtfSubmitted));
        let stages: Vec<Stage> = report.submissions.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![Stage::MotionCorrection, Stage::Alignment, Stage::CtfEstimation]
        );
        assert_eq!(
            std::fs::read_to_string(unit_dir.join("Position_1.rawtlt")).unwrap(),
            "-10.0\n0.0\n10.0\n"
        );
        assert!(unit_dir.join("ctffind_slurm_Position_1.sh").exists());
    }

    #[tokio::test]
    async fn test_submit_failure_stops_unit() {
        let root = TempDir::new().unwrap();
        let mut config = fixtures::config(root.path());
        fixtures::install_templates(&mut config, root.path());
        config.stages.motion_correction = true;
        config.stages.ctf_estimation = true;
        let mock = MockScheduler::new();
        mock.fail_next_submit(SchedulerError::launch(
            "sbatch",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        ))
        .await;

        let report = sequencer(context(config, &mock)).run().await;

        assert!(!report.succeeded());
        assert!(report.state.is_none());
        assert!(report.error.unwrap().contains("scheduler error"));
        assert_eq!(mock.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_gate_timeout_reported() {
        let root = TempDir::new().unwrap();
        let mut config = fixtures::config(root.path());
        fixtures::install_templates(&mut config, root.path());
        config.stages.aretomo_alignment = true;
        config.gate.timeout_secs = Some(0);
        let mock = MockScheduler::new();

        let report = sequencer(context(config, &mock)).run().await;

        assert_eq!(report.state, Some(SequencerState::WaitingForMotionCorr));
        assert!(report.error.unwrap().contains("Timed out"));
        assert_eq!(mock.submission_count().await, 0);
    }
}
