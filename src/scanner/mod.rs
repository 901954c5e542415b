//! Scanner module: directory traversal, fingerprints and the file catalog.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk ([`walker`])
//! - Content fingerprints with BLAKE3 ([`hasher`])
//! - Turning every file under a root into a [`FileDescriptor`] ([`catalog`])
//!
//! # Example
//!
//! ```no_run
//! use asmdupe::scanner::{Catalog, CatalogConfig, ScanClass};
//! use std::path::Path;
//!
//! let config = CatalogConfig::new(ScanClass::Assemblies);
//! let catalog = Catalog::open(Path::new("/opt/dotnet"), None, config)?;
//! for descriptor in catalog.iter() {
//!     let descriptor = descriptor?;
//!     println!("{} {:?}", descriptor.path.display(), descriptor.framework);
//! }
//! # Ok::<(), asmdupe::scanner::CatalogError>(())
//! ```

pub mod catalog;
pub mod hasher;
pub mod walker;

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::metadata::{Architecture, ModuleMetadata};
use crate::version::ModuleVersion;

// Re-export main types
pub use catalog::{Catalog, CatalogConfig, CatalogError};
pub use hasher::{hash_to_hex, Hash, Hasher};
pub use walker::{Walker, WalkerConfig};

/// A regular file found by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes as reported by the walk
    pub size: u64,
}

/// Which files a scan looks at.
///
/// The choice is made on the file extension alone, before any content is
/// read: a `.dll` that is not actually a module still counts as an assembly
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanClass {
    /// Files with a module extension (`dll`, `exe` by default)
    #[default]
    Assemblies,
    /// Every other file
    NonAssemblies,
}

impl ScanClass {
    /// Short name used in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assemblies => "assemblies",
            Self::NonAssemblies => "non-assemblies",
        }
    }

    /// Check whether `path` belongs to this class.
    ///
    /// `module_extensions` are compared case-insensitively and without a dot.
    #[must_use]
    pub fn includes(&self, path: &Path, module_extensions: &[String]) -> bool {
        let is_module = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| module_extensions.iter().any(|m| m.eq_ignore_ascii_case(ext)));
        match self {
            Self::Assemblies => is_module,
            Self::NonAssemblies => !is_module,
        }
    }
}

impl Serialize for ScanClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Everything known about one scanned file.
///
/// Built once by the catalog and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    /// Base name of `path`
    pub filename: String,
    /// Full path, unique within one scan
    pub path: PathBuf,
    /// Byte length
    pub size: u64,
    /// BLAKE3 digest of the full content
    #[serde(serialize_with = "serialize_hash")]
    pub hash: Hash,
    pub assembly_version: Option<ModuleVersion>,
    pub file_version: Option<String>,
    /// Localization tag, `neutral` for modules without one
    pub culture: Option<String>,
    pub architecture: Option<Architecture>,
    /// Target framework moniker
    pub framework: Option<String>,
}

impl FileDescriptor {
    /// Assemble a descriptor from a fingerprint and optional module metadata.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, hash: Hash, metadata: Option<ModuleMetadata>) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = metadata.unwrap_or_default();
        Self {
            filename,
            path,
            size,
            hash,
            assembly_version: metadata.assembly_version,
            file_version: metadata.file_version,
            culture: metadata.culture,
            architecture: metadata.architecture,
            framework: metadata.framework,
        }
    }

    /// Assembly version as text, falling back to the file version string.
    #[must_use]
    pub fn effective_version(&self) -> Option<String> {
        self.assembly_version
            .map(|v| v.to_string())
            .or_else(|| self.file_version.clone())
    }

    /// The version used for ordering: the assembly version, else the file
    /// version if it parses. `None` means "unversioned".
    #[must_use]
    pub fn ordering_version(&self) -> Option<ModuleVersion> {
        self.assembly_version
            .or_else(|| self.file_version.as_deref().and_then(ModuleVersion::parse))
    }

    /// Lowercase hex form of the content hash.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }
}

fn serialize_hash<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hash_to_hex(hash))
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Shutdown was requested while the file was being read.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// The file the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Interrupted(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions() -> Vec<String> {
        vec!["dll".to_string(), "exe".to_string()]
    }

    #[test]
    fn test_scan_class_by_extension() {
        let ext = extensions();
        assert!(ScanClass::Assemblies.includes(Path::new("/a/System.Runtime.dll"), &ext));
        assert!(ScanClass::Assemblies.includes(Path::new("/a/TOOL.EXE"), &ext));
        assert!(!ScanClass::Assemblies.includes(Path::new("/a/readme.txt"), &ext));
        assert!(!ScanClass::Assemblies.includes(Path::new("/a/dll"), &ext));

        assert!(ScanClass::NonAssemblies.includes(Path::new("/a/readme.txt"), &ext));
        assert!(ScanClass::NonAssemblies.includes(Path::new("/a/LICENSE"), &ext));
        assert!(!ScanClass::NonAssemblies.includes(Path::new("/a/x.Dll"), &ext));
    }

    #[test]
    fn test_descriptor_filename_from_path() {
        let d = FileDescriptor::new(PathBuf::from("/root/shared/a/b/Foo.dll"), 3, [0; 32], None);
        assert_eq!(d.filename, "Foo.dll");
        assert_eq!(d.culture, None);
        assert_eq!(d.effective_version(), None);
    }

    #[test]
    fn test_effective_and_ordering_version() {
        let meta = ModuleMetadata {
            file_version: Some("8.0.1 (abc)".to_string()),
            ..ModuleMetadata::default()
        };
        let d = FileDescriptor::new(PathBuf::from("x.dll"), 1, [0; 32], Some(meta));
        assert_eq!(d.effective_version().as_deref(), Some("8.0.1 (abc)"));
        assert_eq!(d.ordering_version(), None);

        let meta = ModuleMetadata {
            assembly_version: Some(ModuleVersion::new(1, 2, 3, 4)),
            file_version: Some("9.9".to_string()),
            ..ModuleMetadata::default()
        };
        let d = FileDescriptor::new(PathBuf::from("x.dll"), 1, [0; 32], Some(meta));
        assert_eq!(d.effective_version().as_deref(), Some("1.2.3.4"));
        assert_eq!(d.ordering_version(), Some(ModuleVersion::new(1, 2, 3, 4)));
    }

    #[test]
    fn test_descriptor_serializes_hash_as_hex() {
        let d = FileDescriptor::new(PathBuf::from("x.dll"), 1, [0xAB; 32], None);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["hash"].as_str().unwrap(), "ab".repeat(32));
        assert!(json["framework"].is_null());
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::PermissionDenied(PathBuf::from("/test"));
        assert_eq!(err.to_string(), "Permission denied: /test");

        let err = ScanError::NotFound(PathBuf::from("/gone.dll"));
        assert_eq!(err.to_string(), "Path not found: /gone.dll");
    }

    #[test]
    fn test_hash_error_from_io() {
        let err = HashError::from_io(
            Path::new("/x"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no"),
        );
        assert!(matches!(err, HashError::PermissionDenied(_)));
        assert_eq!(err.path(), Path::new("/x"));
        assert_eq!(err.to_string(), "Permission denied: /x");
    }
}
