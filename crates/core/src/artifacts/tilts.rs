//! Per-unit inputs derived from the tilt records: sub-frame links, the
//! sorted tilt list, the stacking manifest and the acquisition order list.

use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, info};

use super::error::ArtifactError;
use super::fs::{ensure_dir, ensure_link, write_file, LinkOutcome};
use super::paths::{UnitPaths, MOTIONCORR_JOB_DIR};
use crate::config::format_float;
use crate::mdoc::TiltSeries;

/// Tilt angles in ascending order, one per line.
pub fn rawtlt_contents(series: &TiltSeries) -> String {
    let mut out = String::new();
    for tilt in series.sorted_by_angle() {
        out.push_str(&format_float(tilt.tilt_angle));
        out.push('\n');
    }
    out
}

/// Name of the motion-corrected micrograph produced for a sub-frame movie.
///
/// The first `.` becomes `_`, then the `.<file_type>` extension becomes `.mrc`.
pub fn motion_corrected_name(subframe: &str, file_type: &str) -> String {
    let underscored = subframe.replacen('.', "_", 1);
    underscored.replace(&format!(".{}", file_type), ".mrc")
}

/// Stacking manifest: the section count, then a path and `0` per tilt in
/// ascending angle order.
pub fn newstack_contents(series: &TiltSeries, file_type: &str) -> String {
    let sorted = series.sorted_by_angle();
    let mut out = format!("{}\n", sorted.len());
    for tilt in sorted {
        let _ = writeln!(
            out,
            "{}/{}",
            MOTIONCORR_JOB_DIR,
            motion_corrected_name(&tilt.subframe, file_type)
        );
        out.push_str("0\n");
    }
    out
}

/// `index,angle` rows in acquisition order, 1-based, no header.
pub fn order_list_contents(series: &TiltSeries) -> String {
    let mut out = String::new();
    for (i, tilt) in series.tilts.iter().enumerate() {
        let _ = writeln!(out, "{},{}", i + 1, format_float(tilt.tilt_angle));
    }
    out
}

/// Links every tilt's sub-frame movie from `source_dir` into the unit
/// directory. Returns the number of movies linked.
pub async fn link_subframes(
    series: &TiltSeries,
    source_dir: &Path,
    paths: &UnitPaths,
) -> Result<usize, ArtifactError> {
    ensure_dir(paths.directory()).await?;

    let mut created = 0;
    for tilt in &series.tilts {
        let target = source_dir.join(&tilt.subframe);
        let link = paths.directory().join(&tilt.subframe);
        if ensure_link(&target, &link).await? == LinkOutcome::Created {
            created += 1;
        }
    }

    if created < series.len() {
        debug!(
            unit = paths.name(),
            existing = series.len() - created,
            "Some sub-frame links were already present"
        );
    }
    info!(unit = paths.name(), "{} relevant files found", series.len());
    Ok(series.len())
}

/// Writes the tilt list, stacking manifest and order list.
pub async fn write_tilt_files(
    series: &TiltSeries,
    paths: &UnitPaths,
    file_type: &str,
) -> Result<(), ArtifactError> {
    ensure_dir(paths.directory()).await?;

    let rawtlt = paths.rawtlt();
    write_file(&rawtlt, rawtlt_contents(series)).await?;
    info!(unit = paths.name(), "Tilt information written to {}", rawtlt.display());

    write_file(&paths.newstack(), newstack_contents(series, file_type)).await?;
    write_file(&paths.order_list(), order_list_contents(series)).await?;
    debug!(unit = paths.name(), "Stacking manifest and order list written");
    Ok(())
}
