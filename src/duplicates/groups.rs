//! Duplicate group types and the grouping pass.
//!
//! # Overview
//!
//! Two files are logical duplicates when they share a [`DuplicateKey`]:
//! the same base name, the same culture and the same framework identity.
//! Absent values form their own equivalence class, so two files without a
//! framework identity still match on that field.
//!
//! Names are compared as raw OS strings. Two names that only look alike
//! after lossy UTF-8 conversion never share a group.
//!
//! # Example
//!
//! ```
//! use asmdupe::duplicates::group_descriptors;
//! use asmdupe::scanner::FileDescriptor;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileDescriptor::new(PathBuf::from("/a/Foo.dll"), 10, [1; 32], None),
//!     FileDescriptor::new(PathBuf::from("/b/Foo.dll"), 10, [1; 32], None),
//!     FileDescriptor::new(PathBuf::from("/c/Bar.dll"), 20, [2; 32], None),
//! ];
//!
//! let (groups, stats) = group_descriptors(files);
//!
//! // Only Foo.dll has more than one member
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].key.filename, "Foo.dll");
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::collections::BTreeMap;
use std::ffi::OsString;

use serde::Serialize;

use crate::scanner::FileDescriptor;

/// The equivalence key of a duplicate group.
///
/// Field order matters: the derived ordering sorts by filename, then
/// culture, then framework, with `None` before any value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DuplicateKey {
    /// Display form of the base name
    pub filename: String,
    pub culture: Option<String>,
    pub framework: Option<String>,
    /// Base name exactly as the file system returned it
    #[serde(skip)]
    pub raw_filename: OsString,
}

impl DuplicateKey {
    /// Key of a single descriptor.
    #[must_use]
    pub fn of(descriptor: &FileDescriptor) -> Self {
        Self {
            filename: descriptor.filename.clone(),
            culture: descriptor.culture.clone(),
            framework: descriptor.framework.clone(),
            raw_filename: descriptor
                .path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_default(),
        }
    }
}

/// A set of at least two descriptors sharing one [`DuplicateKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub key: DuplicateKey,
    /// Members in catalog order
    pub files: Vec<FileDescriptor>,
}

impl DuplicateGroup {
    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Statistics from the grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Total number of descriptors processed
    pub total_files: usize,
    /// Total size of all descriptors in bytes
    pub total_size: u64,
    /// Number of distinct keys seen
    pub unique_keys: usize,
    /// Number of descriptors that ended up in a duplicate group
    pub grouped_files: usize,
    /// Number of descriptors dropped as singletons
    pub eliminated_unique: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
}

/// Partition descriptors by [`DuplicateKey`] and drop singleton classes.
///
/// Groups come back sorted by key. Input order does not affect which
/// groups are formed, only the order of members inside each group.
#[must_use]
pub fn group_descriptors(
    files: impl IntoIterator<Item = FileDescriptor>,
) -> (Vec<DuplicateGroup>, GroupingStats) {
    let mut classes: BTreeMap<DuplicateKey, Vec<FileDescriptor>> = BTreeMap::new();
    let mut stats = GroupingStats::default();

    for file in files {
        stats.total_files += 1;
        stats.total_size += file.size;
        classes.entry(DuplicateKey::of(&file)).or_default().push(file);
    }

    stats.unique_keys = classes.len();

    let groups: Vec<DuplicateGroup> = classes
        .into_iter()
        .filter_map(|(key, files)| {
            if files.len() < 2 {
                stats.eliminated_unique += files.len();
                log::trace!("Unique file: {}", key.filename);
                return None;
            }
            stats.grouped_files += files.len();
            stats.duplicate_groups += 1;
            log::debug!(
                "Duplicate group {} ({:?}, {:?}): {} files",
                key.filename,
                key.culture,
                key.framework,
                files.len()
            );
            Some(DuplicateGroup { key, files })
        })
        .collect();

    log::info!(
        "Grouping complete: {} files → {} duplicate groups ({} files)",
        stats.total_files,
        stats.duplicate_groups,
        stats.grouped_files
    );

    (groups, stats)
}
