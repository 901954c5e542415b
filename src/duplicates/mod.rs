//! Duplicate resolution engine.
//!
//! Turns a catalog of [`FileDescriptor`](crate::scanner::FileDescriptor)s into
//! duplicate groups with one canonical member each:
//!
//! 1. **Grouping**: partition by `(filename, culture, framework)` ([`groups`])
//! 2. **Selection**: pick the member to keep ([`selector`])
//! 3. **Categorization**: classify the others and rank groups ([`categorize`])
//!
//! [`DuplicateAnalysis`] runs all three.

pub mod analyzer;
pub mod categorize;
pub mod groups;
pub mod selector;

pub use analyzer::{relative_path, AnalysisSummary, DuplicateAnalysis, ListingRecord, ResolvedGroup};
pub use categorize::{
    bytes_to_mb, categorize_group, classify, Bucket, Category, CategoryStats, GroupCategorization,
    TopGroup,
};
pub use groups::{group_descriptors, DuplicateGroup, DuplicateKey, GroupingStats};
pub use selector::{retention_order, select_canonical, select_canonical_index};
