use asmdupe::metadata::builder::{ModuleImageBuilder, Version4};
use asmdupe::scanner::{Catalog, CatalogConfig, FileDescriptor, ScanClass};
use std::fs;
use std::path::{Path, PathBuf};

/// Write `bytes` to `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

/// A managed module with an assembly identity.
pub fn module(name: &str, version: Version4) -> ModuleImageBuilder {
    ModuleImageBuilder::new().assembly(name, version)
}

pub fn scan(root: &Path, class: ScanClass) -> Vec<FileDescriptor> {
    Catalog::open(root, None, CatalogConfig::new(class))
        .unwrap()
        .collect_parallel()
        .unwrap()
}
