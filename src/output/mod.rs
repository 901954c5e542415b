//! Report formatters.
//!
//! - [`console`]: human-readable summary, top list and cross-framework table
//! - [`csv`]: one row per duplicate group member
//! - [`json`]: the whole report as one document
//!
//! All of them render a [`Report`].
//!
//! # Example
//!
//! ```no_run
//! use asmdupe::duplicates::DuplicateAnalysis;
//! use asmdupe::output::{json::JsonOutput, Report};
//! use asmdupe::scanner::ScanClass;
//! use std::path::Path;
//!
//! let analysis = DuplicateAnalysis::default();
//! let report = Report::new(&analysis, Path::new("/image"), ScanClass::Assemblies, 10);
//! println!("{}", JsonOutput::new(&report).to_json_pretty().unwrap());
//! ```

pub mod console;
pub mod csv;
pub mod json;

use std::path::Path;

use crate::crossfw::CrossFrameworkReport;
use crate::duplicates::DuplicateAnalysis;
use crate::scanner::ScanClass;

pub use self::console::ConsoleOutput;
pub use self::csv::CsvOutput;
pub use self::json::JsonOutput;

/// Everything a formatter needs for one analysis run.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub analysis: &'a DuplicateAnalysis,
    /// The analysis root; listing paths are relative to it
    pub root: &'a Path,
    pub scan_class: ScanClass,
    /// Length of the top list
    pub top_n: usize,
    pub cross_framework: Option<&'a CrossFrameworkReport>,
}

impl<'a> Report<'a> {
    #[must_use]
    pub fn new(analysis: &'a DuplicateAnalysis, root: &'a Path, scan_class: ScanClass, top_n: usize) -> Self {
        Self {
            analysis,
            root,
            scan_class,
            top_n,
            cross_framework: None,
        }
    }

    /// Attach a cross-framework report.
    #[must_use]
    pub fn with_cross_framework(mut self, report: &'a CrossFrameworkReport) -> Self {
        self.cross_framework = Some(report);
        self
    }
}
