//! Cross-unit import assembly.
//!
//! Runs after every unit's per-unit stages have finished. For each unit the
//! [`ImportAssembler`] waits for the motion-correction, CTF and alignment
//! outputs, links them into `RELION_PROCESSING/tomograms/<name>`, and
//! appends the unit's row to `tomograms_descr.star`. The import job itself
//! is submitted by the pipeline once all units are assembled.

mod assembly;
mod imod;
mod star;

pub use assembly::{ImportAssembler, ImportError};
pub use imod::{renumber_excludelist, trim_tlt};
pub use star::{StarFile, StarRow};
