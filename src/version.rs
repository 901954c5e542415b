//! Dotted module version numbers.
//!
//! Versions come from two places: the assembly identity in module metadata
//! (always four components) and free-form file version strings from the
//! version resource (anything goes). Both are compared through
//! [`ModuleVersion`], which follows the dotted-integer convention of 2 to 4
//! numeric components.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// A parsed `major.minor[.build[.revision]]` version.
///
/// Ordering is component-wise and numeric. A missing component sorts before
/// any present one, so `1.0 < 1.0.0 < 1.0.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleVersion {
    pub major: u32,
    pub minor: u32,
    pub build: Option<u32>,
    pub revision: Option<u32>,
}

impl ModuleVersion {
    /// Create a full four-component version.
    #[must_use]
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: Some(revision),
        }
    }

    /// Parse a version string, returning `None` when it is not a 2-4 component
    /// dotted version.
    ///
    /// # Example
    ///
    /// ```
    /// use asmdupe::version::ModuleVersion;
    ///
    /// assert_eq!(ModuleVersion::parse("1.0"), Some(ModuleVersion { major: 1, minor: 0, build: None, revision: None }));
    /// assert!(ModuleVersion::parse("9.0.24.52809 @Commit: abc").is_none());
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }
}

/// Error returned when a string is not a dotted version.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("not a dotted version: {0:?}")]
pub struct ParseVersionError(String);

impl FromStr for ModuleVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(err());
        }

        let mut numbers = Vec::with_capacity(parts.len());
        for part in parts {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            numbers.push(part.parse::<u32>().map_err(|_| err())?);
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            build: numbers.get(2).copied(),
            revision: numbers.get(3).copied(),
        })
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for ModuleVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compare two optional versions, treating `None` as the maximum version.
///
/// This is the ordering used when choosing the canonical copy of a file:
/// versionless (or unparsable) copies never win over a versioned one.
#[must_use]
pub fn cmp_missing_last(a: Option<&ModuleVersion>, b: Option<&ModuleVersion>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
