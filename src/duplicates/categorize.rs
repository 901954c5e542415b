//! Classification of non-canonical group members.
//!
//! Every member other than the canonical one falls in exactly one of three
//! buckets, checked in this order:
//!
//! - [`Category::SameHash`]: byte-identical to the canonical file.
//! - [`Category::DifferentVersion`]: the effective version strings differ.
//! - [`Category::SameVersionDifferentHash`]: same version, other bytes.
//!
//! Same-version members whose known architecture differs from the
//! canonical's are tagged [`Category::SameVersionDifferentArchitecture`].
//! They still count towards the same-version-different-hash bucket; the
//! architecture tag is a sub-bucket, not a fourth partition.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::scanner::FileDescriptor;

use super::selector::select_canonical_index;
use super::{DuplicateGroup, DuplicateKey};

/// Bytes per megabyte in reports.
const BYTES_PER_MB: f64 = 1_048_576.0;

/// Why a non-canonical member is in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SameHash,
    DifferentVersion,
    SameVersionDifferentHash,
    /// Same version, different content, and a known differing architecture
    SameVersionDifferentArchitecture,
}

impl Category {
    /// Kebab-case name used in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameHash => "same-hash",
            Self::DifferentVersion => "different-version",
            Self::SameVersionDifferentHash => "same-version-different-hash",
            Self::SameVersionDifferentArchitecture => "same-version-different-architecture",
        }
    }

    /// Whether this falls in the same-version-different-hash bucket.
    #[must_use]
    pub fn is_same_version_different_hash(&self) -> bool {
        matches!(
            self,
            Self::SameVersionDifferentHash | Self::SameVersionDifferentArchitecture
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Classify `member` against the group's `canonical` file.
#[must_use]
pub fn classify(member: &FileDescriptor, canonical: &FileDescriptor) -> Category {
    if member.hash == canonical.hash {
        return Category::SameHash;
    }
    if member.effective_version() != canonical.effective_version() {
        return Category::DifferentVersion;
    }
    match (member.architecture, canonical.architecture) {
        (Some(a), Some(b)) if a != b => Category::SameVersionDifferentArchitecture,
        _ => Category::SameVersionDifferentHash,
    }
}

/// A file count and byte total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub count: usize,
    pub bytes: u64,
}

impl Bucket {
    fn add(&mut self, size: u64) {
        self.count += 1;
        self.bytes += size;
    }

    fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.bytes += other.bytes;
    }
}

/// Bucket totals over one group or a whole analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub same_hash: Bucket,
    pub different_version: Bucket,
    pub same_version_different_hash: Bucket,
    /// Subset of `same_version_different_hash`
    pub same_version_different_architecture: Bucket,
}

impl CategoryStats {
    /// Count one member of size `size` in `category`.
    pub fn record(&mut self, category: Category, size: u64) {
        match category {
            Category::SameHash => self.same_hash.add(size),
            Category::DifferentVersion => self.different_version.add(size),
            Category::SameVersionDifferentHash => self.same_version_different_hash.add(size),
            Category::SameVersionDifferentArchitecture => {
                self.same_version_different_hash.add(size);
                self.same_version_different_architecture.add(size);
            }
        }
    }

    /// Add another set of totals into this one.
    pub fn merge(&mut self, other: &Self) {
        self.same_hash.merge(&other.same_hash);
        self.different_version.merge(&other.different_version);
        self.same_version_different_hash
            .merge(&other.same_version_different_hash);
        self.same_version_different_architecture
            .merge(&other.same_version_different_architecture);
    }

    /// Members across the three top-level buckets.
    #[must_use]
    pub fn classified_files(&self) -> usize {
        self.same_hash.count + self.different_version.count + self.same_version_different_hash.count
    }

    /// Bytes across the three top-level buckets.
    #[must_use]
    pub fn classified_bytes(&self) -> u64 {
        self.same_hash.bytes + self.different_version.bytes + self.same_version_different_hash.bytes
    }
}

/// The canonical choice and member categories of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCategorization {
    /// Index of the kept member in the group's `files`
    pub canonical: usize,
    /// One entry per member, `None` for the canonical one
    pub categories: Vec<Option<Category>>,
    pub stats: CategoryStats,
    /// Sum of the sizes of all non-canonical members
    pub reclaimable_bytes: u64,
}

impl GroupCategorization {
    /// Number of non-canonical members.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.categories.len().saturating_sub(1)
    }

    /// Check that the buckets partition the non-canonical members.
    ///
    /// Returns a description of the mismatch, if any.
    #[must_use]
    pub fn consistency_violation(&self, key: &DuplicateKey) -> Option<String> {
        let expected = self.duplicate_count();
        let classified = self.stats.classified_files();
        let sub = self.stats.same_version_different_architecture.count;
        if classified != expected {
            return Some(format!(
                "{} ({}, {}): {} members classified, expected {}",
                key.filename,
                key.culture.as_deref().unwrap_or("-"),
                key.framework.as_deref().unwrap_or("-"),
                classified,
                expected
            ));
        }
        if sub > self.stats.same_version_different_hash.count {
            return Some(format!(
                "{}: architecture sub-bucket ({}) exceeds same-version bucket ({})",
                key.filename, sub, self.stats.same_version_different_hash.count
            ));
        }
        None
    }
}

/// Select the canonical member of `group` and classify all others.
///
/// Returns `None` only for an empty group.
#[must_use]
pub fn categorize_group(group: &DuplicateGroup) -> Option<GroupCategorization> {
    let canonical = select_canonical_index(&group.files)?;
    let kept = &group.files[canonical];

    let mut stats = CategoryStats::default();
    let mut reclaimable_bytes = 0u64;
    let categories = group
        .files
        .iter()
        .enumerate()
        .map(|(i, member)| {
            if i == canonical {
                return None;
            }
            let category = classify(member, kept);
            stats.record(category, member.size);
            reclaimable_bytes += member.size;
            log::trace!("{} → {}", member.path.display(), category);
            Some(category)
        })
        .collect();

    Some(GroupCategorization {
        canonical,
        categories,
        stats,
        reclaimable_bytes,
    })
}

/// One row of the top-N report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopGroup {
    pub filename: String,
    pub culture: Option<String>,
    pub framework: Option<String>,
    /// Number of non-canonical members
    pub duplicate_count: usize,
    pub reclaimable_bytes: u64,
    /// `reclaimable_bytes` in MiB, rounded to two decimals
    pub reclaimable_mb: f64,
}

impl TopGroup {
    #[must_use]
    pub fn new(key: &DuplicateKey, categorization: &GroupCategorization) -> Self {
        Self {
            filename: key.filename.clone(),
            culture: key.culture.clone(),
            framework: key.framework.clone(),
            duplicate_count: categorization.duplicate_count(),
            reclaimable_bytes: categorization.reclaimable_bytes,
            reclaimable_mb: bytes_to_mb(categorization.reclaimable_bytes),
        }
    }
}

/// Convert bytes to MiB rounded to two decimals.
#[must_use]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
