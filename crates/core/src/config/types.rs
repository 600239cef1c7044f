use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub microscope: MicroscopeConfig,
    #[serde(default)]
    pub motioncorr: MotionCorrConfig,
    #[serde(default)]
    pub aretomo: AreTomoConfig,
    #[serde(default)]
    pub ctffind: CtfFindConfig,
    #[serde(default)]
    pub reconstruct: ReconstructConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding the metadata files and the raw sub-frame movies.
    pub mdoc_directory: PathBuf,
    /// Root under which one directory per work unit is created.
    pub processing_directory: PathBuf,
}

/// How acquisition metadata is discovered and interpreted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Suffix stripped from the image-file identifier, without the dot (e.g. "mrc").
    pub file_type: String,
    /// Extension of metadata files to pick up.
    #[serde(default = "default_metadata_extension")]
    pub metadata_extension: String,
    /// Metadata files whose name contains this marker are skipped.
    #[serde(default = "default_override_marker")]
    pub override_marker: String,
    /// Rewrite `_Fractions.` to `_fractions.` in sub-frame names.
    #[serde(default)]
    pub modify_subframe_path: bool,
    /// Treat an identifier without the configured suffix as an error.
    #[serde(default)]
    pub strict_suffix: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            file_type: "mrc".to_string(),
            metadata_extension: default_metadata_extension(),
            override_marker: default_override_marker(),
            modify_subframe_path: false,
            strict_suffix: false,
        }
    }
}

fn default_metadata_extension() -> String {
    "mdoc".to_string()
}

fn default_override_marker() -> String {
    "_override".to_string()
}

/// Per-stage enable flags
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StagesConfig {
    #[serde(default)]
    pub file_sorting: bool,
    #[serde(default)]
    pub motion_correction: bool,
    #[serde(default)]
    pub aretomo_alignment: bool,
    #[serde(default)]
    pub ctf_estimation: bool,
    #[serde(default)]
    pub relion_tomo_import: bool,
    #[serde(default)]
    pub relion_tomogram_reconstruction: bool,
}

/// Cluster scheduler access and admission control
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Submission ceiling: no new job is submitted while this many are queued.
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
    #[serde(default = "default_submit_command")]
    pub submit_command: String,
    #[serde(default = "default_queue_command")]
    pub queue_command: String,
    /// Queue owner; `--me` is used when unset.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_min_backoff")]
    pub min_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Give up waiting for queue capacity after this long (None = never).
    #[serde(default)]
    pub capacity_timeout_secs: Option<u64>,
    #[serde(default = "default_stagger_min")]
    pub launch_stagger_min_ms: u64,
    #[serde(default = "default_stagger_max")]
    pub launch_stagger_max_ms: u64,
}

fn default_max_jobs() -> usize {
    20
}

fn default_submit_command() -> String {
    "sbatch".to_string()
}

fn default_queue_command() -> String {
    "squeue".to_string()
}

fn default_min_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    10_000
}

fn default_stagger_min() -> u64 {
    1000
}

fn default_stagger_max() -> u64 {
    5000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
            submit_command: default_submit_command(),
            queue_command: default_queue_command(),
            user: None,
            min_backoff_ms: default_min_backoff(),
            max_backoff_ms: default_max_backoff(),
            capacity_timeout_secs: None,
            launch_stagger_min_ms: default_stagger_min(),
            launch_stagger_max_ms: default_stagger_max(),
        }
    }
}

/// Readiness gate tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GateConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Extra delay after the motion-correction marker appears, before the
    /// dependent stages are submitted.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_poll_interval() -> u64 {
    10_000
}

fn default_settle() -> u64 {
    60_000
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            settle_ms: default_settle(),
            timeout_secs: None,
        }
    }
}

/// Environment modules loaded by the job scripts
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModulesConfig {
    pub relion: Option<String>,
    pub imod: Option<String>,
    pub aretomo: Option<String>,
    pub ctffind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClusterConfig {
    pub partition: Option<String>,
    pub mpis: Option<Param>,
    pub threads: Option<Param>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MicroscopeConfig {
    pub pixel_size: Option<Param>,
    pub voltage: Option<Param>,
    pub cs: Option<Param>,
    pub q0: Option<Param>,
    /// Electron dose per movie frame; also used for the import dose column.
    pub frame_dose: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MotionCorrConfig {
    pub patches: Option<Param>,
    pub eer_grouping: Option<Param>,
    pub gainref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AreTomoConfig {
    pub thickness: Option<Param>,
    pub volume_binning: Option<Param>,
    pub dark_tol: Option<Param>,
    pub ali_z: Option<Param>,
}

/// CTF estimation search range; defocus bounds are given in micrometres.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CtfFindConfig {
    pub lowest_defocus_search: Option<f64>,
    pub highest_defocus_search: Option<f64>,
    pub max_fit_resolution: Option<Param>,
    pub min_fit_resolution: Option<Param>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReconstructConfig {
    pub binning: Option<Param>,
    pub threads: Option<Param>,
}

/// Paths to the job-script templates, one per submitted stage.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemplatesConfig {
    pub motioncorr: Option<PathBuf>,
    pub aretomo: Option<PathBuf>,
    pub ctffind: Option<PathBuf>,
    pub import: Option<PathBuf>,
    pub reconstruct: Option<PathBuf>,
}

/// An opaque tool parameter, rendered into job scripts as written.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Param {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Integer(v) => write!(f, "{}", v),
            Param::Float(v) => f.write_str(&format_float(*v)),
            Param::Text(v) => f.write_str(v),
        }
    }
}

/// Formats a float the way the downstream text formats expect it: integral
/// values keep a trailing `.0`, everything else uses the shortest exact form.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
