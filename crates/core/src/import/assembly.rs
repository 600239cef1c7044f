//! Per-unit assembly of the shared import tree.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use super::imod::{renumber_excludelist, trim_tlt};
use super::star::{StarFile, StarRow};
use crate::artifacts::{
    ensure_dir, ensure_link, read_file, write_file, ArtifactError, RelionPaths, UnitPaths,
};
use crate::gate::{GateError, ReadinessGate, StageArtifact};
use crate::mdoc::TiltSeries;

const WAITER: &str = "RELION";

/// Errors that can occur while assembling one unit's import inputs.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The import dose needs a per-frame dose.
    #[error("microscope.frame_dose is required to compute the import dose")]
    NoFrameDose,

    /// The tilt series has no tilts to take a frame count from.
    #[error("Tilt series of {unit} has no tilts")]
    NoTilts { unit: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Links one unit's stage outputs into `RELION_PROCESSING/tomograms/<name>`
/// and records it in the descriptor table.
#[derive(Debug, Clone)]
pub struct ImportAssembler {
    relion: RelionPaths,
    gate: ReadinessGate,
    frame_dose: Option<f64>,
}

impl ImportAssembler {
    pub fn new(relion: RelionPaths, gate: ReadinessGate, frame_dose: Option<f64>) -> Self {
        Self {
            relion,
            gate,
            frame_dose,
        }
    }

    pub fn relion(&self) -> &RelionPaths {
        &self.relion
    }

    /// Waits for each of the unit's stage outputs in turn and links it in,
    /// then appends the unit's descriptor row.
    pub async fn assemble(&self, unit: &UnitPaths, series: &TiltSeries) -> Result<(), ImportError> {
        let name = unit.name();
        let row = self.star_row(name, series)?;
        let target_dir = self.relion.tomogram_dir(name);
        ensure_dir(&target_dir).await?;

        self.gate_and_link(
            name,
            &unit.unaligned_stack(),
            &target_dir.join(unit.unaligned_stack_name()),
        )
        .await?;
        self.gate_and_link(name, &unit.ctf_list(), &target_dir.join(unit.ctf_list_name()))
            .await?;

        self.gate
            .wait(name, WAITER, &StageArtifact::all_of(unit.alignment_files()))
            .await?;
        self.import_alignment(unit, &target_dir).await?;

        self.gate_and_link(
            name,
            &unit.order_list(),
            &target_dir.join(unit.order_list_name()),
        )
        .await?;

        StarFile::new(self.relion.star_file()).append(&row).await?;
        Ok(())
    }

    fn star_row(&self, name: &str, series: &TiltSeries) -> Result<StarRow, ImportError> {
        let dose = self.frame_dose.ok_or(ImportError::NoFrameDose)?;
        let frames = series.frames_per_tilt().ok_or_else(|| ImportError::NoTilts {
            unit: name.to_string(),
        })?;
        Ok(StarRow::new(name, f64::from(frames) * dose))
    }

    async fn gate_and_link(&self, unit: &str, source: &Path, link: &Path) -> Result<(), ImportError> {
        self.gate
            .wait(unit, WAITER, &StageArtifact::file(source))
            .await?;
        ensure_link(source, link).await?;
        info!(
            unit,
            "{} has been linked into the import tree",
            link.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );
        Ok(())
    }

    /// Brings the `_Imod` directory over: `tilt.com` and the `.tlt` file are
    /// rewritten as regular files, everything else is linked.
    async fn import_alignment(&self, unit: &UnitPaths, target_dir: &Path) -> Result<(), ImportError> {
        let imod_dir = unit.imod_dir();
        let tlt_name = unit.tlt_name();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&imod_dir)
            .await
            .map_err(|e| ArtifactError::read(&imod_dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ArtifactError::read(&imod_dir, e))?
        {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();

        for name in &names {
            let source = imod_dir.join(name);
            let destination = target_dir.join(name);
            if name == "tilt.com" {
                let text = read_file(&source).await?;
                write_file(&destination, renumber_excludelist(&text)).await?;
            } else if *name == tlt_name {
                let text = read_file(&source).await?;
                write_file(&destination, trim_tlt(&text)).await?;
            } else {
                ensure_link(&source, &destination).await?;
            }
        }

        info!(
            unit = unit.name(),
            "{} alignment files brought into the import tree",
            names.len()
        );
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::mdoc::{AcquisitionHeader, TiltRecord};
    use crate::work_unit::IdentityResolver;
    use std::time::Duration;
    use tempfile::TempDir;

    fn series(frames: u32) -> TiltSeries {
        TiltSeries {
            source: None,
            header: AcquisitionHeader::default(),
            tilts: vec![TiltRecord {
                z_value: 0,
                tilt_angle: 0.0,
                subframe: "m.tiff".to_string(),
                frame_count: frames,
            }],
        }
    }

    fn setup(root: &Path) -> (UnitPaths, ImportAssembler) {
        let unit = IdentityResolver::new("mrc", root)
            .resolve_identifier("Position_1.mrc")
            .unwrap();
        let paths = UnitPaths::new(&unit);
        let assembler = ImportAssembler::new(
            RelionPaths::new(root),
            ReadinessGate::new(Duration::from_millis(5)),
            Some(0.25),
        );
        (paths, assembler)
    }

    fn write_stage_outputs(paths: &UnitPaths) {
        std::fs::create_dir_all(paths.directory().join("CTF")).unwrap();
        std::fs::create_dir_all(paths.imod_dir()).unwrap();
        std::fs::write(paths.unaligned_stack(), "stack").unwrap();
        std::fs::write(paths.ctf_list(), "ctf").unwrap();
        std::fs::write(paths.order_list(), "1,0.0\n").unwrap();
        for file in paths.alignment_files() {
            std::fs::write(file, "x").unwrap();
        }
        std::fs::write(paths.imod_dir().join("tilt.com"), "EXCLUDELIST 0, 4\n").unwrap();
        std::fs::write(paths.imod_dir().join(paths.tlt_name()), "0.0  \n\n").unwrap();
    }

    #[tokio::test]
    async fn test_assemble_links_and_rewrites() {
        let root = TempDir::new().unwrap();
        let (paths, assembler) = setup(root.path());
        write_stage_outputs(&paths);

        assembler.assemble(&paths, &series(8)).await.unwrap();

        let target = assembler.relion().tomogram_dir("Position_1");
        let stack = target.join("Position_1_unaligned.mrc");
        assert!(std::fs::symlink_metadata(&stack).unwrap().file_type().is_symlink());
        assert!(std::fs::symlink_metadata(target.join("Position_1.xf"))
            .unwrap()
            .file_type()
            .is_symlink());

        let tilt_com = target.join("tilt.com");
        assert!(!std::fs::symlink_metadata(&tilt_com).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&tilt_com).unwrap(), "EXCLUDELIST 1,5\n");
        assert_eq!(
            std::fs::read_to_string(target.join("Position_1.tlt")).unwrap(),
            "0.0"
        );
        // Source files are untouched.
        assert_eq!(
            std::fs::read_to_string(paths.imod_dir().join("tilt.com")).unwrap(),
            "EXCLUDELIST 0, 4\n"
        );

        let star = std::fs::read_to_string(assembler.relion().star_file()).unwrap();
        assert!(star.contains("Position_1   tomograms/Position_1/Position_1.st"));
        assert!(star.contains("   2.0   "));
    }

    #[tokio::test]
    async fn test_assemble_twice_is_stable() {
        let root = TempDir::new().unwrap();
        let (paths, assembler) = setup(root.path());
        write_stage_outputs(&paths);

        assembler.assemble(&paths, &series(8)).await.unwrap();
        assembler.assemble(&paths, &series(8)).await.unwrap();

        let star = std::fs::read_to_string(assembler.relion().star_file()).unwrap();
        assert_eq!(star.lines().filter(|l| l.starts_with("Position_1 ")).count(), 1);
    }

    #[tokio::test]
    async fn test_waits_for_missing_ctf_list() {
        let root = TempDir::new().unwrap();
        let (paths, assembler) = setup(root.path());
        write_stage_outputs(&paths);
        std::fs::remove_file(paths.ctf_list()).unwrap();

        let assembler = ImportAssembler::new(
            assembler.relion().clone(),
            ReadinessGate::new(Duration::from_millis(5))
                .with_timeout(Some(Duration::from_millis(30))),
            Some(0.25),
        );
        let err = assembler.assemble(&paths, &series(8)).await.unwrap_err();
        assert!(matches!(err, ImportError::Gate(GateError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_requires_frame_dose() {
        let root = TempDir::new().unwrap();
        let (paths, _) = setup(root.path());
        let assembler = ImportAssembler::new(
            RelionPaths::new(root.path()),
            ReadinessGate::new(Duration::from_millis(5)),
            None,
        );
        let err = assembler.assemble(&paths, &series(8)).await.unwrap_err();
        assert!(matches!(err, ImportError::NoFrameDose));
    }
}
