use super::common::{module, scan, write};
use asmdupe::duplicates::{Category, DuplicateAnalysis};
use asmdupe::metadata::builder::Machine;
use asmdupe::scanner::{Catalog, CatalogConfig, ScanClass};
use std::path::Path;
use tempfile::tempdir;

#[test]
fn test_empty_tree() {
    let dir = tempdir().unwrap();
    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    assert!(!analysis.has_duplicates());
    assert_eq!(analysis.summary().files_scanned, 0);
    assert!(analysis.listing(dir.path()).is_empty());
}

#[test]
fn test_identical_copies_are_same_hash() {
    let dir = tempdir().unwrap();
    let image = module("Contoso", (1, 0, 0, 0))
        .assembly_ref("System.Runtime", (8, 0, 0, 0))
        .build();
    write(dir.path(), "shared/a/Contoso.dll", &image);
    write(dir.path(), "shared/b/Contoso.dll", &image);

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    let summary = analysis.summary();
    assert_eq!(summary.duplicate_groups, 1);
    assert_eq!(summary.reclaimable_files, 1);
    assert_eq!(summary.reclaimable_bytes, image.len() as u64);
    assert_eq!(summary.categories.same_hash.count, 1);

    let group = &analysis.groups()[0];
    assert_eq!(group.group.key.framework.as_deref(), Some(".NETCoreApp,Version=v8.0"));
    // equal version and size: the path decides
    assert!(group.canonical().path.ends_with("shared/a/Contoso.dll"));
}

#[test]
fn test_declared_and_inferred_framework_group_together() {
    let dir = tempdir().unwrap();
    let declared = module("Lib", (1, 0, 0, 0))
        .target_framework(".NETCoreApp,Version=v8.0")
        .build();
    let inferred = module("Lib", (1, 0, 0, 0))
        .assembly_ref("System.Runtime", (8, 0, 0, 0))
        .build();
    write(dir.path(), "x/Lib.dll", &declared);
    write(dir.path(), "y/Lib.dll", &inferred);

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    assert_eq!(analysis.summary().duplicate_groups, 1);
    let key = &analysis.groups()[0].group.key;
    assert_eq!(key.filename, "Lib.dll");
    assert_eq!(key.culture.as_deref(), Some("neutral"));
    assert_eq!(key.framework.as_deref(), Some(".NETCoreApp,Version=v8.0"));
}

#[test]
fn test_lower_version_is_kept() {
    let dir = tempdir().unwrap();
    let old = module("Lib", (1, 0, 0, 0)).build();
    let new = module("Lib", (2, 0, 0, 0)).trailing_bytes(4096).build();
    write(dir.path(), "old/Lib.dll", &old);
    write(dir.path(), "new/Lib.dll", &new);

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    let group = &analysis.groups()[0];
    assert!(group.canonical().path.ends_with("old/Lib.dll"));

    let duplicates: Vec<_> = group.duplicates().collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].1, Category::DifferentVersion);
    assert_eq!(analysis.summary().reclaimable_bytes, new.len() as u64);
}

#[test]
fn test_culture_separates_groups() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/Res.dll", &module("Res", (1, 0, 0, 0)).build());
    write(dir.path(), "b/Res.dll", &module("Res", (1, 0, 0, 0)).culture("de").build());

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    assert!(!analysis.has_duplicates());
    assert_eq!(analysis.grouping_stats().unique_keys, 2);
}

#[test]
fn test_architecture_sub_bucket() {
    let dir = tempdir().unwrap();
    let x64 = module("Native", (1, 0, 0, 0)).machine(Machine::X64).build();
    let arm64 = module("Native", (1, 0, 0, 0)).machine(Machine::Arm64).build();
    write(dir.path(), "win-x64/Native.dll", &x64);
    write(dir.path(), "win-arm64/Native.dll", &arm64);

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    let stats = &analysis.summary().categories;
    assert_eq!(stats.same_version_different_hash.count, 1);
    assert_eq!(stats.same_version_different_architecture.count, 1);
    assert_eq!(stats.classified_files(), 1);
}

#[test]
fn test_non_modules_group_by_name_only() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/broken.dll", b"not a PE image");
    write(dir.path(), "b/broken.dll", b"not a PE image");
    write(dir.path(), "a/readme.txt", b"hello");
    write(dir.path(), "b/readme.txt", b"hello");

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    assert_eq!(analysis.summary().files_scanned, 2);
    let key = &analysis.groups()[0].group.key;
    assert_eq!(key.filename, "broken.dll");
    assert!(key.culture.is_none());
    assert!(key.framework.is_none());
    assert_eq!(analysis.summary().categories.same_hash.count, 1);

    let others = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::NonAssemblies));
    assert_eq!(others.summary().files_scanned, 2);
    assert_eq!(others.groups()[0].group.key.filename, "readme.txt");
}

#[test]
fn test_subdir_listing_is_relative_to_analysis_root() {
    let dir = tempdir().unwrap();
    let image = module("Lib", (1, 0, 0, 0)).build();
    write(dir.path(), "image/sdk/a/Lib.dll", &image);
    write(dir.path(), "image/sdk/b/Lib.dll", &image);
    write(dir.path(), "image/other/Lib.dll", &image);

    let catalog = Catalog::open(
        &dir.path().join("image"),
        Some(Path::new("sdk")),
        CatalogConfig::new(ScanClass::Assemblies),
    )
    .unwrap();
    let analysis = DuplicateAnalysis::analyze(catalog.collect_parallel().unwrap());
    assert_eq!(analysis.summary().files_scanned, 2);

    let mut paths: Vec<String> = analysis
        .listing(catalog.root())
        .into_iter()
        .map(|r| r.relative_path)
        .collect();
    paths.sort();
    assert_eq!(paths, ["a/Lib.dll", "b/Lib.dll"]);
}

#[test]
fn test_sequential_and_parallel_agree() {
    let dir = tempdir().unwrap();
    for (i, folder) in ["a", "b", "c", "d"].iter().enumerate() {
        let image = module("Lib", (1, 0, i as u16, 0)).build();
        write(dir.path(), &format!("{folder}/Lib.dll"), &image);
    }

    let catalog = Catalog::open(dir.path(), None, CatalogConfig::new(ScanClass::Assemblies)).unwrap();
    let sequential: Vec<_> = catalog.iter().collect::<Result<_, _>>().unwrap();
    let parallel = catalog.collect_parallel().unwrap();
    assert_eq!(sequential, parallel);

    let a = DuplicateAnalysis::analyze(sequential);
    let b = DuplicateAnalysis::analyze(parallel);
    assert_eq!(a.summary(), b.summary());
    assert_eq!(a.removal_plan(), b.removal_plan());
}
