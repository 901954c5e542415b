//! CSV output formatter for the duplicate listing.
//!
//! One row per member of every duplicate group, canonical members included.
//! Missing values are written as empty cells.
//!
//! # Columns
//!
//! - `filename`, `culture`, `framework`: the duplicate key
//! - `relative_path`: path under the analysis root, `/`-separated
//! - `assembly_version`, `file_version`
//! - `architecture`
//! - `hash`: BLAKE3 content hash (hexadecimal)
//! - `size`: file size in bytes
//! - `canonical`: `true` for the kept member
//! - `category`: empty for the kept member
//!
//! # Example
//!
//! ```no_run
//! use asmdupe::duplicates::DuplicateAnalysis;
//! use asmdupe::output::csv::CsvOutput;
//! use std::path::Path;
//!
//! let analysis = DuplicateAnalysis::default();
//! let listing = analysis.listing(Path::new("/image"));
//! CsvOutput::new(&listing).write_to(std::io::stdout()).unwrap();
//! ```

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::duplicates::ListingRecord;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A single row in the CSV output.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    filename: &'a str,
    culture: &'a str,
    framework: &'a str,
    relative_path: &'a str,
    assembly_version: String,
    file_version: &'a str,
    architecture: &'static str,
    hash: &'a str,
    size: u64,
    canonical: bool,
    category: &'static str,
}

impl<'a> From<&'a ListingRecord> for CsvRow<'a> {
    fn from(record: &'a ListingRecord) -> Self {
        Self {
            filename: &record.filename,
            culture: record.culture.as_deref().unwrap_or_default(),
            framework: record.framework.as_deref().unwrap_or_default(),
            relative_path: &record.relative_path,
            assembly_version: record
                .assembly_version
                .map(|v| v.to_string())
                .unwrap_or_default(),
            file_version: record.file_version.as_deref().unwrap_or_default(),
            architecture: record.architecture.map(|a| a.as_str()).unwrap_or_default(),
            hash: &record.hash,
            size: record.size,
            canonical: record.canonical,
            category: record.category.map(|c| c.as_str()).unwrap_or_default(),
        }
    }
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    records: &'a [ListingRecord],
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(records: &'a [ListingRecord]) -> Self {
        Self { records }
    }

    /// Write the CSV output, header first, to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        if self.records.is_empty() {
            csv_writer.write_record(HEADER)?;
        }
        for record in self.records {
            csv_writer.serialize(CsvRow::from(record))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

// serde only emits the header with the first row
const HEADER: [&str; 11] = [
    "filename",
    "culture",
    "framework",
    "relative_path",
    "assembly_version",
    "file_version",
    "architecture",
    "hash",
    "size",
    "canonical",
    "category",
];
