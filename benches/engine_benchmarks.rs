use asmdupe::crossfw;
use asmdupe::duplicates::DuplicateAnalysis;
use asmdupe::metadata::{self, ModuleImageBuilder};
use asmdupe::scanner::{Catalog, CatalogConfig, FileDescriptor, Hasher, ScanClass};
use asmdupe::version::ModuleVersion;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const FRAMEWORKS: [&str; 4] = [
    ".NETCoreApp,Version=v8.0",
    ".NETCoreApp,Version=v9.0",
    ".NETStandard,Version=v2.0",
    ".NETFramework,Version=v4.6",
];

// Synthetic catalog: `names` modules, each present in `copies` folders
fn synthetic_catalog(names: usize, copies: usize) -> Vec<FileDescriptor> {
    let mut files = Vec::with_capacity(names * copies);
    for n in 0..names {
        for c in 0..copies {
            let path = PathBuf::from(format!("/image/{c}/Module{n}.dll"));
            let mut d = FileDescriptor::new(path, 1000 + (c as u64 * 37) % 500, [(c % 3) as u8; 32], None);
            d.assembly_version = Some(ModuleVersion::new(1, (c % 2) as u32, 0, 0));
            d.culture = Some("neutral".to_string());
            d.framework = Some(FRAMEWORKS[(n + c) % FRAMEWORKS.len()].to_string());
            files.push(d);
        }
    }
    files
}

fn bench_extract(c: &mut Criterion) {
    let image = ModuleImageBuilder::new()
        .assembly("Contoso.Runtime", (8, 0, 0, 0))
        .assembly_ref("System.Runtime", (8, 0, 0, 0))
        .target_framework(".NETCoreApp,Version=v8.0")
        .file_version("8.0.24.52809")
        .build();

    c.bench_function("extract_managed_module", |b| {
        b.iter(|| black_box(metadata::extract(black_box(&image))))
    });
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    for names in [100, 1000, 5000] {
        let files = synthetic_catalog(names, 6);
        group.bench_with_input(BenchmarkId::new("group_select_categorize", names), &files, |b, files| {
            b.iter(|| black_box(DuplicateAnalysis::analyze(files.clone())))
        });
        group.bench_with_input(BenchmarkId::new("cross_framework", names), &files, |b, files| {
            b.iter(|| black_box(crossfw::analyze(files)))
        });
    }
    group.finish();
}

fn bench_catalog(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    for folder in 0..8 {
        let path = dir.path().join(format!("shared/{folder}"));
        fs::create_dir_all(&path).unwrap();
        for n in 0..20 {
            let image = ModuleImageBuilder::new()
                .assembly(&format!("Module{n}"), (1, 0, folder as u16, 0))
                .assembly_ref("System.Runtime", (8, 0, 0, 0))
                .trailing_bytes(4096)
                .build();
            fs::write(path.join(format!("Module{n}.dll")), image).unwrap();
        }
    }

    c.bench_function("catalog_160_modules", |b| {
        b.iter(|| {
            let catalog = Catalog::open(dir.path(), None, CatalogConfig::new(ScanClass::Assemblies)).unwrap();
            black_box(catalog.collect_parallel().unwrap())
        })
    });

    let hasher = Hasher::new();
    let file = dir.path().join("shared/0/Module0.dll");
    c.bench_function("fingerprint_module", |b| {
        b.iter(|| black_box(hasher.fingerprint(&file).unwrap()))
    });
}

criterion_group!(benches, bench_extract, bench_analysis, bench_catalog);
criterion_main!(benches);
