//! Types for parsed acquisition metadata.

use serde::Serialize;
use std::path::PathBuf;

/// Acquisition-level header fields. Absent fields stay `None`; callers that
/// need one treat its absence as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcquisitionHeader {
    /// Accelerating voltage as recorded.
    pub voltage: Option<f64>,
    /// Tilt-axis angle in degrees.
    pub tilt_axis_angle: Option<f64>,
    /// Raw image-file identifier, suffix included (e.g. `Position_1_3.mrc`).
    pub image_file: Option<String>,
}

/// One acquired tilt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiltRecord {
    /// Section index from the `[ZValue = n]` marker.
    pub z_value: i64,
    /// Signed tilt angle in degrees.
    pub tilt_angle: f64,
    /// Sub-frame movie file name, reduced to its final path component.
    pub subframe: String,
    /// Number of movie frames.
    pub frame_count: u32,
}

impl TiltRecord {
    /// Applies a file-name rewrite rule to this record's sub-frame name.
    pub fn normalize(&mut self, rule: &SubframeRename) {
        self.subframe = rule.apply(&self.subframe);
    }
}

/// A substring rewrite applied to sub-frame file names.
///
/// Acquisition and transfer software disagree on the casing of the
/// `_Fractions` token, so the names in the metadata do not always match the
/// files on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubframeRename {
    pub from: String,
    pub to: String,
}

impl SubframeRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// `_Fractions.` → `_fractions.`
    pub fn fractions_casing() -> Self {
        Self::new("_Fractions.", "_fractions.")
    }

    pub fn apply(&self, name: &str) -> String {
        name.replace(&self.from, &self.to)
    }
}

/// A fully parsed metadata file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiltSeries {
    /// File the record was read from, when it came from disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub header: AcquisitionHeader,
    /// Tilts in acquisition order.
    pub tilts: Vec<TiltRecord>,
}

impl TiltSeries {
    /// Number of tilts.
    pub fn len(&self) -> usize {
        self.tilts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tilts.is_empty()
    }

    /// Tilts ordered by ascending tilt angle. The sort is stable, so equal
    /// angles keep their acquisition order.
    pub fn sorted_by_angle(&self) -> Vec<&TiltRecord> {
        let mut sorted: Vec<&TiltRecord> = self.tilts.iter().collect();
        sorted.sort_by(|a, b| a.tilt_angle.total_cmp(&b.tilt_angle));
        sorted
    }

    /// Frame count of the first acquired tilt.
    pub fn frames_per_tilt(&self) -> Option<u32> {
        self.tilts.first().map(|t| t.frame_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilt(z: i64, angle: f64) -> TiltRecord {
        TiltRecord {
            z_value: z,
            tilt_angle: angle,
            subframe: format!("movie_{}.tiff", z),
            frame_count: 8,
        }
    }

    #[test]
    fn test_sorted_by_angle_is_stable() {
        let series = TiltSeries {
            source: None,
            header: AcquisitionHeader::default(),
            tilts: vec![tilt(0, 3.0), tilt(1, -3.0), tilt(2, 3.0), tilt(3, 0.0)],
        };
        let order: Vec<i64> = series.sorted_by_angle().iter().map(|t| t.z_value).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_fractions_casing_rule() {
        let mut record = tilt(0, 0.0);
        record.subframe = "Position_1_001_Fractions.tiff".to_string();
        record.normalize(&SubframeRename::fractions_casing());
        assert_eq!(record.subframe, "Position_1_001_fractions.tiff");
    }

    #[test]
    fn test_rename_leaves_unmatched_names() {
        let rule = SubframeRename::fractions_casing();
        assert_eq!(rule.apply("movie_fractions.tiff"), "movie_fractions.tiff");
        assert_eq!(rule.apply("Fractions.tiff"), "Fractions.tiff");
    }
}
