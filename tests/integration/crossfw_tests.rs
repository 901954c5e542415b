use super::common::{module, scan, write};
use asmdupe::crossfw::{self, CrossFrameworkCategory, Family};
use asmdupe::scanner::ScanClass;
use tempfile::tempdir;

#[test]
fn test_portable_next_to_legacy() {
    let dir = tempdir().unwrap();
    let portable = module("F", (1, 0, 0, 0))
        .target_framework(".NETStandard,Version=v2.0")
        .build();
    let legacy = module("F", (1, 0, 0, 0))
        .target_framework(".NETFramework,Version=v4.6")
        .trailing_bytes(1000)
        .build();
    write(dir.path(), "lib/netstandard2.0/F.dll", &portable);
    write(dir.path(), "lib/net46/F.dll", &legacy);

    let report = crossfw::analyze(&scan(dir.path(), ScanClass::Assemblies));
    assert_eq!(report.groups.len(), 1);

    let group = &report.groups[0];
    assert_eq!(group.filename, "F.dll");
    assert_eq!(group.culture.as_deref(), Some("neutral"));
    assert_eq!(group.families, [Family::LegacyFramework, Family::PortableLayer]);
    assert_eq!(group.findings.len(), 1);
    assert_eq!(group.findings[0].category, CrossFrameworkCategory::PortableSupersedesLegacy);
    assert_eq!(group.findings[0].potential_savings, Some(legacy.len() as u64));
    assert_eq!(report.total_potential_savings, legacy.len() as u64);
}

#[test]
fn test_legacy_and_modern_have_no_estimate() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "net48/G.dll",
        &module("G", (1, 0, 0, 0)).assembly_ref("mscorlib", (4, 0, 0, 0)).build(),
    );
    write(
        dir.path(),
        "net8.0/G.dll",
        &module("G", (1, 0, 0, 0)).assembly_ref("System.Runtime", (8, 0, 0, 0)).build(),
    );

    let report = crossfw::analyze(&scan(dir.path(), ScanClass::Assemblies));
    let total = report.total(CrossFrameworkCategory::LegacyVsModern);
    assert_eq!(total.groups, 1);
    assert_eq!(total.potential_savings, None);
    assert_eq!(report.total_potential_savings, 0);
}

#[test]
fn test_single_framework_is_not_reported() {
    let dir = tempdir().unwrap();
    let image = module("H", (1, 0, 0, 0))
        .target_framework(".NETCoreApp,Version=v9.0")
        .build();
    write(dir.path(), "a/H.dll", &image);
    write(dir.path(), "b/H.dll", &image);

    let report = crossfw::analyze(&scan(dir.path(), ScanClass::Assemblies));
    assert!(report.groups.is_empty());
    assert_eq!(report.totals.len(), CrossFrameworkCategory::ALL.len());
}
