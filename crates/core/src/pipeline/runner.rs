//! Run driver: fan-out, barrier, cross-unit stages.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::discovery::{plan_run, PlannedUnit, RunPlan};
use super::sequencer::{SequencerContext, UnitSequencer};
use super::types::{PipelineError, RunSummary, SequencerState, StagePlan, UnitReport};
use crate::artifacts::{RelionPaths, ScriptWriter, UnitPaths};
use crate::config::Config;
use crate::gate::{ReadinessGate, StageArtifact};
use crate::import::ImportAssembler;
use crate::scheduler::{AdmissionController, Scheduler, SubmissionRecord};
use crate::stage::Stage;

/// Label used in log lines and submission records for the import job.
const IMPORT_LABEL: &str = "RELION_PROCESSING";

/// One launched unit: its planned inputs and the task running its sequence.
pub struct LaunchedUnit {
    pub planned: PlannedUnit,
    pub handle: JoinHandle<UnitReport>,
}

/// Orchestrates a complete run against one scheduler.
pub struct Pipeline {
    ctx: SequencerContext,
    relion: RelionPaths,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, scheduler: Arc<dyn Scheduler>) -> Self {
        let admission = Arc::new(AdmissionController::from_config(
            scheduler,
            &config.scheduler,
        ));
        let ctx = SequencerContext {
            plan: StagePlan::from_config(&config.stages),
            gate: ReadinessGate::from_config(&config.gate),
            scripts: ScriptWriter::new(config.clone()),
            admission,
            config,
        };
        let relion = RelionPaths::new(&ctx.config.paths.processing_directory);
        Self { ctx, relion }
    }

    pub fn plan(&self) -> StagePlan {
        self.ctx.plan
    }

    /// Runs every stage for every discovered metadata file.
    ///
    /// Only a failure to list the metadata directory is returned as an
    /// error; everything else is recorded in the summary.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let plan = plan_run(&self.ctx.config).await?;
        let summary = self.execute(plan).await;

        info!("All jobs submitted. Check for their completion!");
        log_summary(&summary);
        Ok(summary)
    }

    /// Runs an already computed plan.
    pub async fn execute(&self, plan: RunPlan) -> RunSummary {
        let RunPlan { units, rejected } = plan;
        let mut summary = RunSummary::default();

        let launched = self.fan_out(units).await;
        let (planned, mut reports) = wait_all(launched).await;

        if self.ctx.plan.import {
            match self.import_stage(&planned, &mut reports).await {
                Ok(record) => summary.import = record,
                Err(e) => {
                    error!(error = %e, "Import job not submitted");
                    summary.errors.push(e.to_string());
                }
            }
        }

        if self.ctx.plan.reconstruction {
            if self.ctx.plan.import && summary.import.is_none() {
                warn!("Import job was not submitted, skipping reconstruction");
                summary
                    .errors
                    .push("reconstruction skipped: import job was not submitted".to_string());
            } else {
                self.reconstruct_stage(&planned, &mut reports).await;
            }
        }

        for report in reports.iter_mut().filter(|r| r.succeeded()) {
            report.advance(SequencerState::Done);
        }

        summary.units = reports;
        summary.units.extend(rejected);
        summary
    }

    /// Starts one task per unit, pausing a random interval between launches.
    pub async fn fan_out(&self, units: Vec<PlannedUnit>) -> Vec<LaunchedUnit> {
        let mut launched = Vec::with_capacity(units.len());
        for (i, planned) in units.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.stagger()).await;
            }
            info!(unit = planned.unit.name(), "Starting unit");
            let sequencer = UnitSequencer::new(
                self.ctx.clone(),
                planned.source.clone(),
                planned.unit.clone(),
                planned.series.clone(),
            );
            let handle = tokio::spawn(sequencer.run());
            launched.push(LaunchedUnit { planned, handle });
        }
        launched
    }

    fn stagger(&self) -> Duration {
        let scheduler = &self.ctx.config.scheduler;
        let min = scheduler.launch_stagger_min_ms;
        let max = scheduler.launch_stagger_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Assembles every successful unit into the import tree, then submits
    /// the import job. Per-unit failures are recorded on the unit.
    async fn import_stage(
        &self,
        planned: &[PlannedUnit],
        reports: &mut [UnitReport],
    ) -> Result<Option<SubmissionRecord>, PipelineError> {
        let assembler = ImportAssembler::new(
            self.relion.clone(),
            self.ctx.gate.clone(),
            self.ctx.config.microscope.frame_dose,
        );

        let mut assembled = 0;
        for (planned, report) in planned.iter().zip(reports.iter_mut()) {
            if !report.succeeded() {
                continue;
            }
            report.advance(SequencerState::WaitingForAlignment);
            let paths = UnitPaths::new(&planned.unit);
            match assembler.assemble(&paths, &planned.series).await {
                Ok(()) => {
                    report.advance(SequencerState::ImportAssembled);
                    assembled += 1;
                }
                Err(e) => {
                    let e = PipelineError::from(e);
                    error!(unit = planned.unit.name(), error = %e, "Import assembly failed");
                    report.fail(&e);
                }
            }
        }

        if assembled == 0 {
            warn!("No unit was assembled, import job not submitted");
            return Ok(None);
        }

        let script = self.ctx.scripts.write_import_script().await?;
        let record = self
            .ctx
            .admission
            .submit(IMPORT_LABEL, Stage::Import, &script)
            .await?;
        Ok(Some(record))
    }

    /// Submits one reconstruction job per successful unit once the import
    /// job has succeeded.
    async fn reconstruct_stage(&self, planned: &[PlannedUnit], reports: &mut [UnitReport]) {
        let marker = StageArtifact::file(self.relion.import_marker());

        for (planned, report) in planned.iter().zip(reports.iter_mut()) {
            if !report.succeeded() {
                continue;
            }
            let name = planned.unit.name();
            match self.reconstruct_unit(planned, report, &marker).await {
                Ok(()) => report.advance(SequencerState::ReconstructSubmitted),
                Err(e) => {
                    error!(unit = name, error = %e, "Reconstruction not submitted");
                    report.fail(&e);
                }
            }
        }
    }

    async fn reconstruct_unit(
        &self,
        planned: &PlannedUnit,
        report: &mut UnitReport,
        import_marker: &StageArtifact,
    ) -> Result<(), PipelineError> {
        let name = planned.unit.name();
        let paths = UnitPaths::new(&planned.unit);
        let script = self
            .ctx
            .scripts
            .write_unit_script(Stage::Reconstruction, &paths)
            .await?;
        self.ctx.gate.wait(name, "Reconstruction", import_marker).await?;
        info!(unit = name, "Import finished. Requesting tomogram reconstruction");
        let record = self
            .ctx
            .admission
            .submit(name, Stage::Reconstruction, &script)
            .await?;
        report.record(record);
        Ok(())
    }
}

/// Barrier: waits for every launched unit and returns the reports in
/// launch order. A task that panicked becomes a failed report.
pub async fn wait_all(launched: Vec<LaunchedUnit>) -> (Vec<PlannedUnit>, Vec<UnitReport>) {
    let (planned, handles): (Vec<_>, Vec<_>) = launched
        .into_iter()
        .map(|l| (l.planned, l.handle))
        .unzip();

    let results = join_all(handles).await;

    let reports = planned
        .iter()
        .zip(results)
        .map(|(planned, result)| match result {
            Ok(report) => report,
            Err(join_error) => {
                let e = PipelineError::TaskFailed {
                    unit: planned.unit.name().to_string(),
                    reason: join_error.to_string(),
                };
                error!(unit = planned.unit.name(), error = %e, "Unit task failed");
                UnitReport::rejected(planned.source.clone(), Some(planned.unit.name().to_string()), &e)
            }
        })
        .collect();

    (planned, reports)
}

fn log_summary(summary: &RunSummary) {
    for report in &summary.units {
        match &report.error {
            None => info!(
                unit = %report.label(),
                state = ?report.state,
                submitted = report.submissions.len(),
                "Unit finished"
            ),
            Some(error) => warn!(
                unit = %report.label(),
                state = ?report.state,
                error = %error,
                "Unit failed"
            ),
        }
    }
    for error in &summary.errors {
        warn!(error = %error, "Run error");
    }
}
