//! JSON output formatter.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "generated_at": "2026-01-01T12:00:00Z",
//!   "root": "/image/shared",
//!   "scan_class": "assemblies",
//!   "summary": { "files_scanned": 2, "reclaimable_bytes": 1024, "categories": { ... }, "warnings": [] },
//!   "top_groups": [ { "filename": "System.Runtime.dll", "duplicate_count": 1, "reclaimable_mb": 0.0, ... } ],
//!   "groups": [ { "filename": "System.Runtime.dll", "canonical": "a/System.Runtime.dll", "members": [ ... ] } ],
//!   "cross_framework": { ... }
//! }
//! ```
//!
//! `cross_framework` is omitted unless requested.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crossfw::CrossFrameworkReport;
use crate::duplicates::{relative_path, AnalysisSummary, ListingRecord, ResolvedGroup, TopGroup};
use crate::scanner::ScanClass;

use super::Report;

/// A duplicate group with its members.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    pub filename: String,
    pub culture: Option<String>,
    pub framework: Option<String>,
    /// Relative path of the kept member
    pub canonical: String,
    pub reclaimable_bytes: u64,
    pub members: Vec<ListingRecord>,
}

impl JsonGroup {
    fn new(group: &ResolvedGroup, report: &Report<'_>) -> Self {
        let key = &group.group.key;
        let members = group.records(report.root).collect();
        Self {
            filename: key.filename.clone(),
            culture: key.culture.clone(),
            framework: key.framework.clone(),
            canonical: relative_path(&group.canonical().path, report.root),
            reclaimable_bytes: group.categorization.reclaimable_bytes,
            members,
        }
    }
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    pub generated_at: DateTime<Utc>,
    pub root: String,
    pub scan_class: ScanClass,
    pub summary: AnalysisSummary,
    pub top_groups: Vec<TopGroup>,
    pub groups: Vec<JsonGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_framework: Option<CrossFrameworkReport>,
}

impl JsonOutput {
    /// Build the document, stamped with the current time.
    #[must_use]
    pub fn new(report: &Report<'_>) -> Self {
        Self::at(report, Utc::now())
    }

    /// Build the document with an explicit timestamp.
    #[must_use]
    pub fn at(report: &Report<'_>, generated_at: DateTime<Utc>) -> Self {
        let analysis = report.analysis;
        Self {
            generated_at,
            root: report.root.to_string_lossy().into_owned(),
            scan_class: report.scan_class,
            summary: analysis.summary().clone(),
            top_groups: analysis.top_groups(report.top_n),
            groups: analysis
                .groups()
                .iter()
                .map(|g| JsonGroup::new(g, report))
                .collect(),
            cross_framework: report.cross_framework.cloned(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON and a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
