//! Where each stage reads and writes.
//!
//! External tools signal completion only through these files, so the
//! layout here is a contract with the job-script templates.

use std::path::{Path, PathBuf};

use crate::stage::Stage;
use crate::work_unit::WorkUnit;

/// File RELION writes into a job directory when the job succeeded.
pub const SUCCESS_MARKER: &str = "RELION_JOB_EXIT_SUCCESS";

/// Motion-correction job directory, relative to the unit directory.
pub const MOTIONCORR_JOB_DIR: &str = "MotionCorr/job002";

/// Root of the shared import tree, relative to the processing directory.
pub const RELION_DIR: &str = "RELION_PROCESSING";

/// Paths owned by one work unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    name: String,
    dir: PathBuf,
}

impl UnitPaths {
    pub fn new(unit: &WorkUnit) -> Self {
        Self {
            name: unit.name().to_string(),
            dir: unit.directory().to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Rendered job script for a per-unit stage.
    pub fn script(&self, stage: Stage) -> PathBuf {
        self.dir.join(stage.script_name(&self.name))
    }

    pub fn rawtlt(&self) -> PathBuf {
        self.dir.join(format!("{}.rawtlt", self.name))
    }

    pub fn newstack(&self) -> PathBuf {
        self.dir.join(format!("{}_newstack.txt", self.name))
    }

    pub fn order_list(&self) -> PathBuf {
        self.dir.join(self.order_list_name())
    }

    pub fn order_list_name(&self) -> String {
        format!("{}_order_list.csv", self.name)
    }

    pub fn motioncorr_marker(&self) -> PathBuf {
        self.dir.join(MOTIONCORR_JOB_DIR).join(SUCCESS_MARKER)
    }

    pub fn unaligned_stack_name(&self) -> String {
        format!("{}_unaligned.mrc", self.name)
    }

    pub fn unaligned_stack(&self) -> PathBuf {
        self.dir.join(self.unaligned_stack_name())
    }

    pub fn ctf_list_name(&self) -> String {
        format!("{}.txt", self.name)
    }

    pub fn ctf_list(&self) -> PathBuf {
        self.dir.join("CTF").join(self.ctf_list_name())
    }

    /// IMOD-format alignment output written by AreTomo.
    pub fn imod_dir(&self) -> PathBuf {
        self.dir.join(format!("{}_Imod", self.name))
    }

    pub fn tlt_name(&self) -> String {
        format!("{}.tlt", self.name)
    }

    /// Every file the alignment stage must have produced.
    pub fn alignment_files(&self) -> Vec<PathBuf> {
        let imod = self.imod_dir();
        vec![
            imod.join("tilt.com"),
            imod.join("newst.com"),
            imod.join(self.tlt_name()),
            imod.join(format!("{}.st", self.name)),
            imod.join(format!("{}.xf", self.name)),
            imod.join(format!("{}.xtilt", self.name)),
        ]
    }
}

/// Paths of the shared import tree under `<processing>/RELION_PROCESSING`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelionPaths {
    root: PathBuf,
}

impl RelionPaths {
    pub fn new(processing_directory: &Path) -> Self {
        Self {
            root: processing_directory.join(RELION_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tomogram_dir(&self, name: &str) -> PathBuf {
        self.root.join("tomograms").join(name)
    }

    pub fn star_file(&self) -> PathBuf {
        self.root.join("tomograms_descr.star")
    }

    pub fn import_script(&self) -> PathBuf {
        self.root.join(Stage::Import.script_name(""))
    }

    pub fn import_marker(&self) -> PathBuf {
        self.root.join("ImportTomo/job001").join(SUCCESS_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_unit::IdentityResolver;

    fn paths() -> UnitPaths {
        let unit = IdentityResolver::new("mrc", "/proc")
            .resolve_identifier("Position_1_3.mrc")
            .unwrap();
        UnitPaths::new(&unit)
    }

    #[test]
    fn test_unit_paths() {
        let p = paths();
        assert_eq!(p.rawtlt(), Path::new("/proc/Position_1_3/Position_1_3.rawtlt"));
        assert_eq!(
            p.motioncorr_marker(),
            Path::new("/proc/Position_1_3/MotionCorr/job002/RELION_JOB_EXIT_SUCCESS")
        );
        assert_eq!(
            p.ctf_list(),
            Path::new("/proc/Position_1_3/CTF/Position_1_3.txt")
        );
        assert_eq!(
            p.script(Stage::Alignment),
            Path::new("/proc/Position_1_3/aretomo_slurm_Position_1_3.sh")
        );
    }

    #[test]
    fn test_alignment_files_live_in_imod_dir() {
        let p = paths();
        let files = p.alignment_files();
        assert_eq!(files.len(), 6);
        assert!(files.iter().all(|f| f.starts_with(p.imod_dir())));
        assert!(files.contains(&p.imod_dir().join("Position_1_3.xtilt")));
    }

    #[test]
    fn test_relion_paths() {
        let relion = RelionPaths::new(Path::new("/proc"));
        assert_eq!(
            relion.import_script(),
            Path::new("/proc/RELION_PROCESSING/relion_import.sh")
        );
        assert_eq!(
            relion.import_marker(),
            Path::new("/proc/RELION_PROCESSING/ImportTomo/job001/RELION_JOB_EXIT_SUCCESS")
        );
        assert_eq!(
            relion.tomogram_dir("P1"),
            Path::new("/proc/RELION_PROCESSING/tomograms/P1")
        );
    }
}
