//! The index computation engine.
//!
//! [`detect`] reports what a table can feed, [`index`] holds the per-type
//! formulas, [`processor`] runs a whole dataset and [`report`] summarizes
//! stored results.

pub mod detect;
pub mod index;
pub mod processor;
pub mod report;

pub use detect::{detect, preview, DatasetPreview};
pub use processor::{process, ProcessingOutcome};
pub use report::{aggregate, ReportData, ReportFilter};
