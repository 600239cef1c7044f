//! Text parser for mdoc files.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;

use super::error::MdocError;
use super::types::{AcquisitionHeader, SubframeRename, TiltRecord, TiltSeries};

static VOLTAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Voltage = ([-+]?\d+(?:\.\d+)?)").expect("valid regex"));
static TILT_AXIS_ANGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TiltAxisAngle = ([-+]?\d+(?:\.\d+)?)").expect("valid regex"));
static IMAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ImageFile = (.+)").expect("valid regex"));
static SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[ZValue = (-?\d+)\]").expect("valid regex"));
static TILT_ANGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TiltAngle = ([-+]?\d+(?:\.\d+)?)").expect("valid regex"));
static SUBFRAME_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SubFramePath = (.+)").expect("valid regex"));
static NUM_SUBFRAMES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"NumSubFrames = (\d+)").expect("valid regex"));
// Final path component, whichever separator the acquisition host used.
static FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\\/:*?"<>|\r\n]+$"#).expect("valid regex"));

/// Options applied while parsing.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Rewrite rule applied to every tilt's sub-frame name.
    pub rename: Option<SubframeRename>,
}

impl ParseOptions {
    pub fn with_rename(mut self, rule: SubframeRename) -> Self {
        self.rename = Some(rule);
        self
    }
}

/// Reads and parses an mdoc file.
pub async fn read_mdoc(path: &Path, options: &ParseOptions) -> Result<TiltSeries, MdocError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| MdocError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut series = parse_mdoc(&text, options)?;
    series.source = Some(path.to_path_buf());
    Ok(series)
}

/// Parses the text of an mdoc file.
pub fn parse_mdoc(text: &str, options: &ParseOptions) -> Result<TiltSeries, MdocError> {
    let header = AcquisitionHeader {
        voltage: capture(&VOLTAGE, text).and_then(|v| v.parse().ok()),
        tilt_axis_angle: capture(&TILT_AXIS_ANGLE, text).and_then(|v| v.parse().ok()),
        image_file: capture(&IMAGE_FILE, text).map(|v| v.trim().to_string()),
    };

    let markers: Vec<(i64, usize, usize)> = SECTION
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            let z = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<i64>().ok())
                .unwrap_or_default();
            (z, whole.0, whole.1)
        })
        .collect();

    if markers.is_empty() {
        return Err(MdocError::parse("no [ZValue = n] tilt sections found"));
    }

    let mut tilts = Vec::with_capacity(markers.len());
    for (i, &(z_value, _, body_start)) in markers.iter().enumerate() {
        let body_end = markers.get(i + 1).map(|m| m.1).unwrap_or(text.len());
        let mut record = parse_section(z_value, &text[body_start..body_end])?;
        if let Some(rule) = &options.rename {
            record.normalize(rule);
        }
        tilts.push(record);
    }

    Ok(TiltSeries {
        source: None,
        header,
        tilts,
    })
}

fn parse_section(z_value: i64, body: &str) -> Result<TiltRecord, MdocError> {
    let missing = |field: &'static str| MdocError::MissingField {
        field,
        segment: z_value,
    };

    let tilt_angle = capture(&TILT_ANGLE, body)
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| missing("TiltAngle"))?;

    let subframe = capture(&SUBFRAME_PATH, body)
        .map(str::trim)
        .and_then(|path| FILE_NAME.find(path))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| missing("SubFramePath"))?;

    let frame_count = capture(&NUM_SUBFRAMES, body)
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| missing("NumSubFrames"))?;

    Ok(TiltRecord {
        z_value,
        tilt_angle,
        subframe,
        frame_count,
    })
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
