use super::common::{module, scan, write};
use asmdupe::actions::{delete_batch, removal_targets, DeleteConfig};
use asmdupe::duplicates::DuplicateAnalysis;
use asmdupe::scanner::ScanClass;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_removal_keeps_canonical_copies() {
    let dir = tempdir().unwrap();
    let image = module("Lib", (1, 0, 0, 0)).build();
    let a = write(dir.path(), "a/Lib.dll", &image);
    let b = write(dir.path(), "b/Lib.dll", &image);
    let c = write(dir.path(), "c/Lib.dll", &image);
    let other = write(dir.path(), "c/Other.dll", &module("Other", (1, 0, 0, 0)).build());

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    let targets = removal_targets(&analysis).unwrap();
    assert_eq!(targets.len(), 2);

    let result = delete_batch(&targets, &DeleteConfig::permanent());
    assert!(result.all_succeeded());
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.bytes_freed, 2 * image.len() as u64);

    assert!(a.exists());
    assert!(!b.exists());
    assert!(!c.exists());
    assert!(other.exists());

    // a second pass finds nothing left to remove
    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    assert!(!analysis.has_duplicates());
}

#[test]
fn test_modified_file_is_skipped() {
    let dir = tempdir().unwrap();
    let image = module("Lib", (1, 0, 0, 0)).build();
    write(dir.path(), "a/Lib.dll", &image);
    let b = write(dir.path(), "b/Lib.dll", &image);

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    let targets = removal_targets(&analysis).unwrap();
    fs::write(&b, b"changed after the scan").unwrap();

    let result = delete_batch(&targets, &DeleteConfig::permanent());
    assert!(!result.all_succeeded());
    assert_eq!(result.failure_count(), 1);
    assert!(b.exists());
}

#[test]
fn test_removal_plan_matches_targets() {
    let dir = tempdir().unwrap();
    let v1 = module("Lib", (1, 0, 0, 0)).build();
    let v2 = module("Lib", (2, 0, 0, 0)).build();
    write(dir.path(), "x/Lib.dll", &v2);
    write(dir.path(), "y/Lib.dll", &v1);

    let analysis = DuplicateAnalysis::analyze(scan(dir.path(), ScanClass::Assemblies));
    let plan = analysis.removal_plan();
    let targets = removal_targets(&analysis).unwrap();
    assert_eq!(plan.len(), 1);
    assert!(plan[0].ends_with("x/Lib.dll"));
    assert_eq!(targets[0].path, plan[0]);
    assert_eq!(targets[0].expected_size, v2.len() as u64);
}
