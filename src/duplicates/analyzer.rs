//! Duplicate analysis: grouping, canonical selection and categorization in
//! one pass over a catalog.
//!
//! # Example
//!
//! ```no_run
//! use asmdupe::duplicates::DuplicateAnalysis;
//! use asmdupe::scanner::{Catalog, CatalogConfig, ScanClass};
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Path::new("/opt/dotnet"), None, CatalogConfig::new(ScanClass::Assemblies))?;
//! let descriptors = catalog.collect_parallel()?;
//! let analysis = DuplicateAnalysis::analyze(descriptors);
//!
//! println!("{} duplicate groups", analysis.summary().duplicate_groups);
//! for path in analysis.removal_plan() {
//!     println!("remove {}", path.display());
//! }
//! # Ok::<(), asmdupe::scanner::CatalogError>(())
//! ```

use std::path::Path;

use serde::Serialize;

use crate::metadata::Architecture;
use crate::scanner::FileDescriptor;
use crate::version::ModuleVersion;

use super::categorize::{categorize_group, Category, CategoryStats, GroupCategorization, TopGroup};
use super::groups::{group_descriptors, DuplicateGroup, GroupingStats};

/// A duplicate group together with its canonical member and categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    pub group: DuplicateGroup,
    pub categorization: GroupCategorization,
}

impl ResolvedGroup {
    /// The member to keep.
    #[must_use]
    pub fn canonical(&self) -> &FileDescriptor {
        &self.group.files[self.categorization.canonical]
    }

    /// All members except the canonical one, with their category.
    pub fn duplicates(&self) -> impl Iterator<Item = (&FileDescriptor, Category)> {
        self.group
            .files
            .iter()
            .zip(&self.categorization.categories)
            .filter_map(|(file, category)| category.map(|c| (file, c)))
    }

    /// Listing records for every member, in group order.
    pub fn records<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = ListingRecord> + 'a {
        self.group
            .files
            .iter()
            .zip(&self.categorization.categories)
            .map(move |(file, category)| ListingRecord::new(file, root, *category))
    }
}

/// Totals over one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub files_scanned: usize,
    pub bytes_scanned: u64,
    pub duplicate_groups: usize,
    /// Non-canonical members across all groups
    pub reclaimable_files: usize,
    pub reclaimable_bytes: u64,
    pub categories: CategoryStats,
    /// Categorization consistency problems, empty on a healthy run
    pub warnings: Vec<String>,
}

/// One row of the duplicate listing: a member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    pub filename: String,
    pub culture: Option<String>,
    pub framework: Option<String>,
    /// Path relative to the analysis root, `/`-separated
    pub relative_path: String,
    pub assembly_version: Option<ModuleVersion>,
    pub file_version: Option<String>,
    pub architecture: Option<Architecture>,
    pub hash: String,
    pub size: u64,
    pub canonical: bool,
    /// `None` for the canonical member
    pub category: Option<Category>,
}

impl ListingRecord {
    #[must_use]
    pub fn new(file: &FileDescriptor, root: &Path, category: Option<Category>) -> Self {
        Self {
            filename: file.filename.clone(),
            culture: file.culture.clone(),
            framework: file.framework.clone(),
            relative_path: relative_path(&file.path, root),
            assembly_version: file.assembly_version,
            file_version: file.file_version.clone(),
            architecture: file.architecture,
            hash: file.hash_hex(),
            size: file.size,
            canonical: category.is_none(),
            category,
        }
    }
}

/// Render `path` relative to `root` with forward slashes.
///
/// Paths outside `root` are rendered in full.
#[must_use]
pub fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Result of running the duplicate engine over a catalog.
#[derive(Debug, Clone, Default)]
pub struct DuplicateAnalysis {
    groups: Vec<ResolvedGroup>,
    grouping: GroupingStats,
    summary: AnalysisSummary,
}

impl DuplicateAnalysis {
    /// Group descriptors, select a canonical member per group and classify
    /// the rest.
    ///
    /// Consistency violations are logged at `warn` and collected in
    /// [`AnalysisSummary::warnings`]; they never fail the analysis.
    #[must_use]
    pub fn analyze(descriptors: impl IntoIterator<Item = FileDescriptor>) -> Self {
        let (groups, grouping) = group_descriptors(descriptors);

        let mut summary = AnalysisSummary {
            files_scanned: grouping.total_files,
            bytes_scanned: grouping.total_size,
            ..AnalysisSummary::default()
        };

        let groups: Vec<ResolvedGroup> = groups
            .into_iter()
            .filter_map(|group| {
                let categorization = categorize_group(&group)?;
                if let Some(warning) = categorization.consistency_violation(&group.key) {
                    log::warn!("Categorization mismatch: {}", warning);
                    summary.warnings.push(warning);
                }
                summary.categories.merge(&categorization.stats);
                summary.reclaimable_files += categorization.duplicate_count();
                summary.reclaimable_bytes += categorization.reclaimable_bytes;
                Some(ResolvedGroup {
                    group,
                    categorization,
                })
            })
            .collect();

        summary.duplicate_groups = groups.len();

        log::info!(
            "Analysis complete: {} groups, {} removable files ({} bytes)",
            summary.duplicate_groups,
            summary.reclaimable_files,
            summary.reclaimable_bytes
        );

        Self {
            groups,
            grouping,
            summary,
        }
    }

    /// Resolved groups, sorted by key.
    #[must_use]
    pub fn groups(&self) -> &[ResolvedGroup] {
        &self.groups
    }

    #[must_use]
    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    #[must_use]
    pub fn grouping_stats(&self) -> &GroupingStats {
        &self.grouping
    }

    /// Whether any duplicate group was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Every non-canonical path across all groups.
    ///
    /// Canonical paths never appear, so no group loses all of its members.
    #[must_use]
    pub fn removal_plan(&self) -> Vec<&Path> {
        self.groups
            .iter()
            .flat_map(|g| g.duplicates().map(|(file, _)| file.path.as_path()))
            .collect()
    }

    /// The `n` groups with the most reclaimable bytes, largest first.
    ///
    /// Equal totals keep key order.
    #[must_use]
    pub fn top_groups(&self, n: usize) -> Vec<TopGroup> {
        let mut ranked: Vec<&ResolvedGroup> = self.groups.iter().collect();
        ranked.sort_by(|a, b| {
            b.categorization
                .reclaimable_bytes
                .cmp(&a.categorization.reclaimable_bytes)
        });
        ranked
            .into_iter()
            .take(n)
            .map(|g| TopGroup::new(&g.group.key, &g.categorization))
            .collect()
    }

    /// One record per member of every duplicate group, paths relative to
    /// `root`.
    #[must_use]
    pub fn listing(&self, root: &Path) -> Vec<ListingRecord> {
        self.groups.iter().flat_map(|g| g.records(root)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn member(path: &str, version: Option<&str>, size: u64, hash: u8) -> FileDescriptor {
        let mut d = FileDescriptor::new(PathBuf::from(path), size, [hash; 32], None);
        d.assembly_version = version.and_then(ModuleVersion::parse);
        d.culture = Some("neutral".to_string());
        d
    }

    fn sample() -> Vec<FileDescriptor> {
        vec![
            member("/root/a/A.dll", Some("1.0.0.0"), 100, 1),
            member("/root/b/A.dll", Some("1.0.0.0"), 200, 1),
            member("/root/a/B.dll", Some("1.0"), 50, 2),
            member("/root/b/B.dll", Some("2.0"), 999, 3),
            member("/root/c/B.dll", Some("2.0"), 999, 3),
            member("/root/only/C.dll", None, 7, 4),
        ]
    }

    #[test]
    fn test_summary_totals() {
        let analysis = DuplicateAnalysis::analyze(sample());
        let summary = analysis.summary();
        assert_eq!(summary.files_scanned, 6);
        assert_eq!(summary.bytes_scanned, 100 + 200 + 50 + 999 + 999 + 7);
        assert_eq!(summary.duplicate_groups, 2);
        assert_eq!(summary.reclaimable_files, 3);
        assert_eq!(summary.reclaimable_bytes, 100 + 999 + 999);
        assert_eq!(summary.categories.same_hash.count, 1);
        assert_eq!(summary.categories.different_version.count, 2);
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn test_removal_plan_excludes_canonical() {
        let analysis = DuplicateAnalysis::analyze(sample());
        let plan = analysis.removal_plan();
        assert_eq!(plan.len(), 3);
        assert!(!plan.contains(&Path::new("/root/b/A.dll")));
        assert!(!plan.contains(&Path::new("/root/a/B.dll")));
        assert!(plan.contains(&Path::new("/root/a/A.dll")));
    }

    #[test]
    fn test_top_groups_ranked() {
        let analysis = DuplicateAnalysis::analyze(sample());
        let top = analysis.top_groups(10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].filename, "B.dll");
        assert_eq!(top[0].duplicate_count, 2);
        assert_eq!(top[0].reclaimable_bytes, 1998);
        assert_eq!(top[1].filename, "A.dll");

        assert_eq!(analysis.top_groups(1).len(), 1);
    }

    #[test]
    fn test_listing_records() {
        let analysis = DuplicateAnalysis::analyze(sample());
        let listing = analysis.listing(Path::new("/root"));
        assert_eq!(listing.len(), 5);

        let canonical: Vec<_> = listing.iter().filter(|r| r.canonical).collect();
        assert_eq!(canonical.len(), 2);
        assert!(canonical.iter().all(|r| r.category.is_none()));

        let a = listing.iter().find(|r| r.relative_path == "a/A.dll").unwrap();
        assert_eq!(a.category, Some(Category::SameHash));
        assert_eq!(a.hash, "01".repeat(32));
    }

    #[test]
    fn test_no_duplicates() {
        let analysis = DuplicateAnalysis::analyze(vec![member("/x/A.dll", None, 1, 1)]);
        assert!(!analysis.has_duplicates());
        assert!(analysis.removal_plan().is_empty());
        assert_eq!(analysis.grouping_stats().eliminated_unique, 1);
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/root/shared/x/A.dll"), Path::new("/root")),
            "shared/x/A.dll"
        );
        assert_eq!(relative_path(Path::new("other/A.dll"), Path::new("/root")), "other/A.dll");
    }
}
