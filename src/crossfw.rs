//! Cross-framework analysis.
//!
//! # Overview
//!
//! The duplicate engine keys on framework identity, so the same library
//! built for several frameworks never lands in one group. This pass regroups
//! the catalog by `(filename, culture)` alone and reports groups whose
//! members target two or more distinct frameworks, classified by how the
//! frameworks relate.
//!
//! Savings here are estimates under a "keep the most portable build"
//! policy. A group can count towards several categories, so the totals do
//! not partition anything and must not be used as a removal plan.
//!
//! # Example
//!
//! ```
//! use asmdupe::crossfw::{analyze, CrossFrameworkCategory};
//! use asmdupe::scanner::FileDescriptor;
//! use std::path::PathBuf;
//!
//! let mut portable = FileDescriptor::new(PathBuf::from("/a/F.dll"), 10, [1; 32], None);
//! portable.framework = Some(".NETStandard,Version=v2.0".to_string());
//! let mut legacy = FileDescriptor::new(PathBuf::from("/b/F.dll"), 30, [2; 32], None);
//! legacy.framework = Some(".NETFramework,Version=v4.6".to_string());
//!
//! let report = analyze(&[portable, legacy]);
//! let total = report.total(CrossFrameworkCategory::PortableSupersedesLegacy);
//! assert_eq!(total.groups, 1);
//! assert_eq!(total.potential_savings, Some(30));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::scanner::FileDescriptor;

/// First major version of the unified runtime short names (`net5.0`).
const FIRST_MODERN_SHORT_MAJOR: u32 = 5;

/// Coarse runtime family of a framework identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    LegacyFramework,
    ModernRuntime,
    PortableLayer,
    Unknown,
}

impl Family {
    /// Classify a framework identity or short moniker.
    ///
    /// Explicit family names (`.NETFramework`, `.NETCoreApp`, `netcoreapp`,
    /// `.NETStandard`, `netstandard`, `.NETPortable`, `portable-`) decide
    /// first. Otherwise a short moniker is parsed: `net` followed by a dotted
    /// version of major 5 or above is the modern runtime, `net` followed by
    /// bare digits (`net48`) is the legacy framework.
    ///
    /// ```
    /// use asmdupe::crossfw::Family;
    ///
    /// assert_eq!(Family::of(".NETCoreApp,Version=v8.0"), Family::ModernRuntime);
    /// assert_eq!(Family::of("net472"), Family::LegacyFramework);
    /// assert_eq!(Family::of("net6.0-windows"), Family::ModernRuntime);
    /// assert_eq!(Family::of("Silverlight,Version=v5.0"), Family::Unknown);
    /// ```
    #[must_use]
    pub fn of(identity: &str) -> Self {
        let lower = identity.trim().to_ascii_lowercase();

        if lower.starts_with(".netframework") {
            return Self::LegacyFramework;
        }
        if lower.starts_with(".netcoreapp") || lower.starts_with("netcoreapp") {
            return Self::ModernRuntime;
        }
        if lower.starts_with(".netstandard")
            || lower.starts_with("netstandard")
            || lower.starts_with(".netportable")
            || lower.starts_with("portable-")
        {
            return Self::PortableLayer;
        }

        Self::from_short_name(&lower)
    }

    fn from_short_name(lower: &str) -> Self {
        let Some(rest) = lower.strip_prefix("net") else {
            return Self::Unknown;
        };
        // Platform suffix, e.g. `net8.0-windows`
        let version = rest.split('-').next().unwrap_or(rest);
        if version.is_empty() {
            return Self::Unknown;
        }

        match version.split_once('.') {
            Some((major, minor)) => {
                let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
                if !numeric(major) || !numeric(minor) {
                    return Self::Unknown;
                }
                match major.parse::<u32>() {
                    Ok(m) if m >= FIRST_MODERN_SHORT_MAJOR => Self::ModernRuntime,
                    _ => Self::Unknown,
                }
            }
            None if version.bytes().all(|b| b.is_ascii_digit()) => Self::LegacyFramework,
            None => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyFramework => "legacy-framework",
            Self::ModernRuntime => "modern-runtime",
            Self::PortableLayer => "portable-layer",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Family {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How the frameworks of a cross-framework group relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrossFrameworkCategory {
    /// Legacy framework and modern runtime builds side by side
    LegacyVsModern,
    /// Only legacy framework builds, at several versions
    DifferentLegacyVersions,
    /// Only modern runtime builds, at several versions
    DifferentModernVersions,
    /// Two or more portable-layer versions; no savings estimate
    MultiplePortableVersions,
    /// Portable-layer build next to legacy framework builds
    PortableSupersedesLegacy,
    /// Portable-layer build next to modern runtime builds
    PortableSupersedesModern,
}

impl CrossFrameworkCategory {
    pub const ALL: [Self; 6] = [
        Self::LegacyVsModern,
        Self::DifferentLegacyVersions,
        Self::DifferentModernVersions,
        Self::MultiplePortableVersions,
        Self::PortableSupersedesLegacy,
        Self::PortableSupersedesModern,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyVsModern => "legacy-vs-modern",
            Self::DifferentLegacyVersions => "different-legacy-versions",
            Self::DifferentModernVersions => "different-modern-versions",
            Self::MultiplePortableVersions => "multiple-portable-versions",
            Self::PortableSupersedesLegacy => "portable-supersedes-legacy",
            Self::PortableSupersedesModern => "portable-supersedes-modern",
        }
    }

    /// Whether the category carries a savings estimate.
    #[must_use]
    pub fn has_savings(&self) -> bool {
        !matches!(self, Self::LegacyVsModern | Self::MultiplePortableVersions)
    }
}

impl fmt::Display for CrossFrameworkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CrossFrameworkCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One category assigned to a group, with its savings estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryFinding {
    pub category: CrossFrameworkCategory,
    pub potential_savings: Option<u64>,
}

/// A `(filename, culture)` group spanning several frameworks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossFrameworkGroup {
    pub filename: String,
    pub culture: Option<String>,
    /// Distinct framework identities, sorted
    pub frameworks: Vec<String>,
    /// Distinct families present, sorted
    pub families: Vec<Family>,
    pub member_count: usize,
    pub findings: Vec<CategoryFinding>,
}

/// Per-category totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: CrossFrameworkCategory,
    pub groups: usize,
    /// `None` for categories without an estimate
    pub potential_savings: Option<u64>,
}

/// Result of the cross-framework pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossFrameworkReport {
    pub groups: Vec<CrossFrameworkGroup>,
    /// One entry per category, in [`CrossFrameworkCategory::ALL`] order
    pub totals: Vec<CategoryTotal>,
    /// Sum of all category estimates
    pub total_potential_savings: u64,
}

impl CrossFrameworkReport {
    /// Totals for one category.
    #[must_use]
    pub fn total(&self, category: CrossFrameworkCategory) -> CategoryTotal {
        self.totals
            .iter()
            .copied()
            .find(|t| t.category == category)
            .unwrap_or(CategoryTotal {
                category,
                groups: 0,
                potential_savings: category.has_savings().then_some(0),
            })
    }
}

/// A member that declares a framework.
struct Targeted<'a> {
    file: &'a FileDescriptor,
    framework: &'a str,
    family: Family,
}

/// Run the cross-framework pass over a catalog.
#[must_use]
pub fn analyze(descriptors: &[FileDescriptor]) -> CrossFrameworkReport {
    let mut classes: BTreeMap<(&str, Option<&str>), Vec<&FileDescriptor>> = BTreeMap::new();
    for d in descriptors {
        classes
            .entry((d.filename.as_str(), d.culture.as_deref()))
            .or_default()
            .push(d);
    }

    let groups: Vec<CrossFrameworkGroup> = classes
        .into_iter()
        .filter_map(|((filename, culture), members)| classify_group(filename, culture, &members))
        .collect();

    let totals: Vec<CategoryTotal> = CrossFrameworkCategory::ALL
        .iter()
        .map(|&category| {
            let findings = groups
                .iter()
                .flat_map(|g| &g.findings)
                .filter(|f| f.category == category);
            let mut total = CategoryTotal {
                category,
                groups: 0,
                potential_savings: category.has_savings().then_some(0),
            };
            for finding in findings {
                total.groups += 1;
                if let (Some(sum), Some(s)) = (total.potential_savings.as_mut(), finding.potential_savings) {
                    *sum += s;
                }
            }
            total
        })
        .collect();

    let total_potential_savings = totals.iter().filter_map(|t| t.potential_savings).sum();

    log::info!(
        "Cross-framework pass: {} groups, {} bytes potential savings",
        groups.len(),
        total_potential_savings
    );

    CrossFrameworkReport {
        groups,
        totals,
        total_potential_savings,
    }
}

fn classify_group(
    filename: &str,
    culture: Option<&str>,
    members: &[&FileDescriptor],
) -> Option<CrossFrameworkGroup> {
    let targeted: Vec<Targeted<'_>> = members
        .iter()
        .copied()
        .filter_map(|file| {
            file.framework.as_deref().map(|framework| Targeted {
                file,
                framework,
                family: Family::of(framework),
            })
        })
        .collect();

    let frameworks: BTreeSet<&str> = targeted.iter().map(|t| t.framework).collect();
    if frameworks.len() < 2 {
        return None;
    }
    let families: BTreeSet<Family> = targeted.iter().map(|t| t.family).collect();

    let distinct_in = |family: Family| {
        targeted
            .iter()
            .filter(|t| t.family == family)
            .map(|t| t.framework)
            .collect::<BTreeSet<_>>()
            .len()
    };
    let size_of = |family: Family| -> u64 {
        targeted
            .iter()
            .filter(|t| t.family == family)
            .map(|t| t.file.size)
            .sum()
    };
    let only = |family: Family| families.len() == 1 && families.contains(&family);

    let has_legacy = families.contains(&Family::LegacyFramework);
    let has_modern = families.contains(&Family::ModernRuntime);
    let has_portable = families.contains(&Family::PortableLayer);

    let mut findings = Vec::new();
    let mut push = |category: CrossFrameworkCategory, potential_savings: Option<u64>| {
        findings.push(CategoryFinding {
            category,
            potential_savings,
        });
    };

    if has_legacy && has_modern {
        push(CrossFrameworkCategory::LegacyVsModern, None);
    }
    if only(Family::LegacyFramework) && distinct_in(Family::LegacyFramework) >= 2 {
        push(
            CrossFrameworkCategory::DifferentLegacyVersions,
            Some(all_but_lowest_identity(&targeted)),
        );
    }
    if only(Family::ModernRuntime) && distinct_in(Family::ModernRuntime) >= 2 {
        push(
            CrossFrameworkCategory::DifferentModernVersions,
            Some(all_but_lowest_identity(&targeted)),
        );
    }
    if distinct_in(Family::PortableLayer) >= 2 {
        push(CrossFrameworkCategory::MultiplePortableVersions, None);
    }
    if has_portable && has_legacy {
        push(
            CrossFrameworkCategory::PortableSupersedesLegacy,
            Some(size_of(Family::LegacyFramework)),
        );
    }
    if has_portable && has_modern {
        push(
            CrossFrameworkCategory::PortableSupersedesModern,
            Some(size_of(Family::ModernRuntime)),
        );
    }

    log::debug!(
        "{} spans {} frameworks: {:?}",
        filename,
        frameworks.len(),
        findings.iter().map(|f| f.category.as_str()).collect::<Vec<_>>()
    );

    Some(CrossFrameworkGroup {
        filename: filename.to_string(),
        culture: culture.map(str::to_string),
        frameworks: frameworks.into_iter().map(str::to_string).collect(),
        families: families.into_iter().collect(),
        member_count: members.len(),
        findings,
    })
}

/// Total size of all members except one member with the lexicographically
/// lowest identity (ties broken by path).
fn all_but_lowest_identity(targeted: &[Targeted<'_>]) -> u64 {
    let total: u64 = targeted.iter().map(|t| t.file.size).sum();
    let kept = targeted
        .iter()
        .min_by(|a, b| a.framework.cmp(b.framework).then_with(|| a.file.path.cmp(&b.file.path)))
        .map_or(0, |t| t.file.size);
    total - kept
}
