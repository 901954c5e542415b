//! Canonical file selection.
//!
//! Exactly one member of every duplicate group is kept. The policy is a
//! total order over the members:
//!
//! 1. Lowest ordering version first (assembly version, else a parseable file
//!    version). Unversioned members sort after every versioned one.
//! 2. Larger size first on equal versions.
//! 3. Path ascending.
//!
//! Lowest-version-wins keeps the copy loadable by the widest set of
//! consumers. The policy is relied on downstream and must not change.

use std::cmp::Ordering;

use crate::scanner::FileDescriptor;
use crate::version::cmp_missing_last;

use super::DuplicateGroup;

/// Compare two members by retention preference. `Less` means `a` is kept
/// in favour of `b`.
#[must_use]
pub fn retention_order(a: &FileDescriptor, b: &FileDescriptor) -> Ordering {
    cmp_missing_last(a.ordering_version().as_ref(), b.ordering_version().as_ref())
        .then_with(|| b.size.cmp(&a.size))
        .then_with(|| a.path.cmp(&b.path))
}

/// Index of the member to keep, or `None` for an empty slice.
#[must_use]
pub fn select_canonical_index(files: &[FileDescriptor]) -> Option<usize> {
    files
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| retention_order(a, b))
        .map(|(i, _)| i)
}

/// The member of `group` to keep.
///
/// # Example
///
/// ```
/// use asmdupe::duplicates::{group_descriptors, select_canonical};
/// use asmdupe::scanner::FileDescriptor;
/// use std::path::PathBuf;
///
/// let small = FileDescriptor::new(PathBuf::from("/a/X.dll"), 100, [1; 32], None);
/// let large = FileDescriptor::new(PathBuf::from("/b/X.dll"), 200, [1; 32], None);
/// let (groups, _) = group_descriptors(vec![small, large]);
///
/// // Neither is versioned, so the larger file wins
/// assert_eq!(select_canonical(&groups[0]).map(|d| d.size), Some(200));
/// ```
#[must_use]
pub fn select_canonical(group: &DuplicateGroup) -> Option<&FileDescriptor> {
    select_canonical_index(&group.files).map(|i| &group.files[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::ModuleVersion;
    use std::path::PathBuf;

    fn member(path: &str, version: Option<&str>, size: u64) -> FileDescriptor {
        let mut d = FileDescriptor::new(PathBuf::from(path), size, [0; 32], None);
        d.assembly_version = version.and_then(ModuleVersion::parse);
        d
    }

    #[test]
    fn test_equal_version_prefers_larger() {
        let files = vec![
            member("/a/A.dll", Some("1.0.0.0"), 100),
            member("/b/A.dll", Some("1.0.0.0"), 200),
        ];
        assert_eq!(select_canonical_index(&files), Some(1));
    }

    #[test]
    fn test_lower_version_beats_size() {
        let files = vec![
            member("/a/A.dll", Some("2.0"), 999),
            member("/b/A.dll", Some("1.0"), 50),
        ];
        assert_eq!(select_canonical_index(&files), Some(1));
    }

    #[test]
    fn test_versioned_beats_unversioned() {
        let files = vec![member("/a/A.dll", None, 10_000), member("/b/A.dll", Some("9.0"), 20)];
        assert_eq!(select_canonical_index(&files), Some(1));
    }

    #[test]
    fn test_file_version_is_fallback() {
        let mut with_file_version = member("/a/A.dll", None, 1);
        with_file_version.file_version = Some("4.6.26515.06".to_string());
        let unparsable = {
            let mut d = member("/b/A.dll", None, 100);
            d.file_version = Some("4.0 built by: x".to_string());
            d
        };
        let files = vec![unparsable, with_file_version];
        assert_eq!(select_canonical_index(&files), Some(1));
    }

    #[test]
    fn test_full_tie_uses_path() {
        let files = vec![member("/z/A.dll", None, 5), member("/a/A.dll", None, 5)];
        assert_eq!(select_canonical_index(&files), Some(1));
    }

    #[test]
    fn test_selection_is_order_independent() {
        let mut files = vec![
            member("/a/A.dll", Some("1.0"), 5),
            member("/b/A.dll", Some("1.0"), 5),
            member("/c/A.dll", None, 50),
        ];
        let first = files[select_canonical_index(&files).unwrap()].path.clone();
        files.reverse();
        let second = files[select_canonical_index(&files).unwrap()].path.clone();
        assert_eq!(first, second);
        assert_eq!(first, PathBuf::from("/a/A.dll"));
    }

    #[test]
    fn test_empty_has_no_canonical() {
        assert_eq!(select_canonical_index(&[]), None);
    }
}
