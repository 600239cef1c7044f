//! Run orchestration.
//!
//! A run goes through three phases:
//!
//! 1. **Planning** ([`plan_run`]): every metadata file is parsed and resolved
//!    to a work unit before anything is written. Unparseable files and name
//!    collisions are rejected here.
//! 2. **Fan-out** ([`Pipeline::fan_out`]): one task per unit runs the
//!    per-unit stages through a [`UnitSequencer`]. Launches are staggered by a
//!    random pause. [`wait_all`] is the barrier that collects every task.
//! 3. **Cross-unit stages**: the import tree is assembled from the successful
//!    units, the import job is submitted, then one reconstruction job per
//!    unit once the import job has succeeded.
//!
//! Every job goes through the shared admission controller, so the number of
//! queued jobs stays under the configured ceiling across all units.

mod discovery;
mod runner;
mod sequencer;
mod types;

pub use discovery::{
    discover_metadata, identity_resolver, parse_options, plan_run, PlannedUnit, RunPlan,
};
pub use runner::{wait_all, LaunchedUnit, Pipeline};
pub use sequencer::{SequencerContext, UnitSequencer};
pub use types::{PipelineError, RunSummary, SequencerState, StagePlan, UnitReport};
