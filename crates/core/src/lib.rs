pub mod artifacts;
pub mod config;
pub mod gate;
pub mod import;
pub mod mdoc;
pub mod pipeline;
pub mod scheduler;
pub mod stage;
pub mod template;
pub mod testing;
pub mod work_unit;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError,
};
pub use gate::{GateError, GateOutcome, ReadinessGate, StageArtifact};
pub use mdoc::{parse_mdoc, read_mdoc, MdocError, ParseOptions, TiltRecord, TiltSeries};
pub use pipeline::{Pipeline, PipelineError, RunSummary, SequencerState, UnitReport};
pub use scheduler::{AdmissionController, Scheduler, SchedulerError, SlurmScheduler};
pub use stage::Stage;
pub use work_unit::{IdentityResolver, WorkUnit, WorkUnitError};
