//! Acquisition metadata (`.mdoc`) parsing.
//!
//! An mdoc file is a `Key = value` text record written by the acquisition
//! software: a header block followed by one `[ZValue = n]` section per
//! acquired tilt. [`parse_mdoc`] turns it into a [`TiltSeries`]: the
//! acquisition-level [`AcquisitionHeader`] plus the [`TiltRecord`]s in
//! acquisition order.
//!
//! Header fields are optional and come back as `None` when absent. The three
//! per-tilt fields (`TiltAngle`, `SubFramePath`, `NumSubFrames`) are required;
//! the first section missing one of them fails the whole file with
//! [`MdocError::MissingField`].
//!
//! # Example
//!
//! ```ignore
//! use tomoprep_core::mdoc::{read_mdoc, ParseOptions, SubframeRename};
//!
//! let options = ParseOptions::default().with_rename(SubframeRename::fractions_casing());
//! let series = read_mdoc(Path::new("/data/frames/Position_1_3.mrc.mdoc"), &options).await?;
//! for tilt in series.sorted_by_angle() {
//!     println!("{} {}", tilt.tilt_angle, tilt.subframe);
//! }
//! ```

mod error;
mod parser;
mod types;

pub use error::MdocError;
pub use parser::{parse_mdoc, read_mdoc, ParseOptions};
pub use types::{AcquisitionHeader, SubframeRename, TiltRecord, TiltSeries};
