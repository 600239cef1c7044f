//! Files the pipeline writes for and reads from the external tools.
//!
//! - `paths`: the fixed layout of a unit directory and the shared import tree
//! - `tilts`: sub-frame links, tilt list, stacking manifest, order list
//! - `scripts`: job scripts rendered from the configured templates
//!
//! Links are created idempotently: re-running over an existing unit
//! directory leaves identical links alone and refuses to replace anything
//! else.

mod error;
mod fs;
mod paths;
mod scripts;
mod tilts;

pub use error::ArtifactError;
pub use fs::{ensure_dir, ensure_link, read_file, write_file, LinkOutcome};
pub use paths::{RelionPaths, UnitPaths, MOTIONCORR_JOB_DIR, RELION_DIR, SUCCESS_MARKER};
pub use scripts::{ScriptError, ScriptWriter};
pub use tilts::{
    link_subframes, motion_corrected_name, newstack_contents, order_list_contents,
    rawtlt_contents, write_tilt_files,
};
