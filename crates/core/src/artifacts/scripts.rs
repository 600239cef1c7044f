//! Rendering of per-stage job scripts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::error::ArtifactError;
use super::fs::{ensure_dir, write_file};
use super::paths::{RelionPaths, UnitPaths};
use crate::config::{format_float, Config};
use crate::stage::Stage;
use crate::template::{Template, TemplateError, TemplateVars};

/// Errors that can occur while producing a job script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// No template path is configured for the stage.
    #[error("No template configured for {stage}")]
    NoTemplate { stage: Stage },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Renders job scripts from the configured templates.
#[derive(Debug, Clone)]
pub struct ScriptWriter {
    config: Arc<Config>,
    relion: RelionPaths,
}

impl ScriptWriter {
    pub fn new(config: Arc<Config>) -> Self {
        let relion = RelionPaths::new(&config.paths.processing_directory);
        Self { config, relion }
    }

    /// Renders and writes the script of a per-unit stage into the unit
    /// directory. Returns the script path.
    pub async fn write_unit_script(
        &self,
        stage: Stage,
        unit: &UnitPaths,
    ) -> Result<PathBuf, ScriptError> {
        let vars = self.unit_vars(stage, unit);
        let path = unit.script(stage);
        ensure_dir(unit.directory()).await?;
        self.render_to(stage, &vars, &path).await?;
        Ok(path)
    }

    /// Renders and writes the import script into the shared import tree.
    pub async fn write_import_script(&self) -> Result<PathBuf, ScriptError> {
        let vars = self.import_vars();
        let path = self.relion.import_script();
        ensure_dir(self.relion.root()).await?;
        self.render_to(Stage::Import, &vars, &path).await?;
        Ok(path)
    }

    async fn render_to(
        &self,
        stage: Stage,
        vars: &TemplateVars,
        path: &Path,
    ) -> Result<(), ScriptError> {
        let template_path = self
            .template_path(stage)
            .ok_or(ScriptError::NoTemplate { stage })?;
        let rendered = Template::load(template_path).await?.render(vars)?;
        write_file(path, rendered).await?;
        debug!(stage = %stage, script = %path.display(), "Job script written");
        Ok(())
    }

    fn template_path(&self, stage: Stage) -> Option<&Path> {
        let templates = &self.config.templates;
        match stage {
            Stage::MotionCorrection => templates.motioncorr.as_deref(),
            Stage::Alignment => templates.aretomo.as_deref(),
            Stage::CtfEstimation => templates.ctffind.as_deref(),
            Stage::Import => templates.import.as_deref(),
            Stage::Reconstruction => templates.reconstruct.as_deref(),
        }
    }

    /// Values available to a per-unit stage's template.
    pub fn unit_vars(&self, stage: Stage, unit: &UnitPaths) -> TemplateVars {
        let c = &*self.config;
        let base = TemplateVars::new()
            .path("position_directory", unit.directory())
            .set("position_prefix", unit.name())
            .set_opt("partition", c.cluster.partition.as_ref());

        match stage {
            Stage::MotionCorrection => base
                .path("processing_directory", &c.paths.processing_directory)
                .set_opt("relion_module", c.modules.relion.as_ref())
                .set_opt("imod_module", c.modules.imod.as_ref())
                .set_opt("MPIs", c.cluster.mpis.as_ref())
                .set_opt("threads", c.cluster.threads.as_ref())
                .set_opt("pixel_size", c.microscope.pixel_size.as_ref())
                .set_opt("voltage", c.microscope.voltage.as_ref())
                .set_opt("Cs", c.microscope.cs.as_ref())
                .set_opt("Q0", c.microscope.q0.as_ref())
                .set("file_type", &c.acquisition.file_type)
                .set_opt("frame_dose", c.microscope.frame_dose.map(format_float))
                .set_opt("motioncorr_patches", c.motioncorr.patches.as_ref())
                .set_opt("eer_grouping", c.motioncorr.eer_grouping.as_ref())
                .set_opt("gainref", c.motioncorr.gainref.as_ref()),
            Stage::Alignment => base
                .set_opt("aretomo_module", c.modules.aretomo.as_ref())
                .set_opt("MPIs", c.cluster.mpis.as_ref())
                .set_opt("threads", c.cluster.threads.as_ref())
                .set_opt("aretomo_DarkTol", c.aretomo.dark_tol.as_ref())
                .set_opt("aretomo_volume_binning", c.aretomo.volume_binning.as_ref())
                .set_opt("aretomo_thickness", c.aretomo.thickness.as_ref())
                .set_opt("aretomo_AliZ", c.aretomo.ali_z.as_ref()),
            Stage::CtfEstimation => base
                .path("processing_directory", &c.paths.processing_directory)
                .set_opt("ctffind_module", c.modules.ctffind.as_ref())
                .set_opt("Cs", c.microscope.cs.as_ref())
                .set_opt("Q0", c.microscope.q0.as_ref())
                .set_opt("max_ctf_fit_resolution", c.ctffind.max_fit_resolution.as_ref())
                .set_opt("min_ctf_fit_resolution", c.ctffind.min_fit_resolution.as_ref())
                .set_opt(
                    "min_defocus_search",
                    c.ctffind.lowest_defocus_search.map(defocus_angstrom),
                )
                .set_opt(
                    "max_defocus_search",
                    c.ctffind.highest_defocus_search.map(defocus_angstrom),
                )
                .set_opt("pixel_size", c.microscope.pixel_size.as_ref())
                .set_opt("voltage", c.microscope.voltage.as_ref()),
            Stage::Reconstruction => base
                .set_opt("relion_module", c.modules.relion.as_ref())
                .set_opt("tomo_reconstruct_threads", c.reconstruct.threads.as_ref())
                .set_opt("tomo_reconstruct_binning", c.reconstruct.binning.as_ref())
                .path("relion_directory", self.relion.root()),
            Stage::Import => self.import_vars(),
        }
    }

    /// Values available to the import template.
    pub fn import_vars(&self) -> TemplateVars {
        let c = &*self.config;
        TemplateVars::new()
            .set_opt("relion_module", c.modules.relion.as_ref())
            .set_opt("partition", c.cluster.partition.as_ref())
            .path("relion_directory", self.relion.root())
            .set_opt("pixel_size", c.microscope.pixel_size.as_ref())
            .set_opt("voltage", c.microscope.voltage.as_ref())
            .set_opt("Cs", c.microscope.cs.as_ref())
            .set_opt("Q0", c.microscope.q0.as_ref())
    }
}

/// Micrometres to the absolute Ångström value the CTF template expects.
fn defocus_angstrom(micrometres: f64) -> String {
    format_float((micrometres * 10000.0).abs())
}
