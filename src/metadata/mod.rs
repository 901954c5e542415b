//! Module metadata extraction.
//!
//! This module reads the identity of a binary module from its bytes:
//! - PE/COFF headers and the target machine ([`pe`])
//! - ECMA-335 metadata tables: assembly identity, references, custom attributes ([`tables`])
//! - The target framework, declared or inferred from references ([`framework`])
//! - The file version string from the version resource ([`version_info`])
//!
//! Every step is independently fallible. Failures are logged at trace level and
//! turn into an absent field; nothing here aborts a scan.
//!
//! # Example
//!
//! ```
//! use asmdupe::metadata::{extract, ModuleImageBuilder};
//!
//! let image = ModuleImageBuilder::new()
//!     .assembly("Contoso.Core", (8, 0, 0, 0))
//!     .assembly_ref("System.Runtime", (8, 0, 0, 0))
//!     .build();
//!
//! let meta = extract(&image).expect("a managed module");
//! assert_eq!(meta.culture.as_deref(), Some("neutral"));
//! assert_eq!(meta.framework.as_deref(), Some(".NETCoreApp,Version=v8.0"));
//! ```

pub mod builder;
pub mod framework;
pub mod pe;
pub mod tables;
pub mod version_info;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use serde::Serialize;

use crate::version::ModuleVersion;

pub use builder::ModuleImageBuilder;
pub use pe::{Architecture, PeImage};
pub use tables::{AssemblyIdentity, AssemblyReference, CliHeader, Metadata};

/// Culture recorded for modules that declare none.
pub const NEUTRAL_CULTURE: &str = "neutral";

/// Smallest file that could hold a DOS header plus a PE signature.
const MIN_IMAGE_SIZE: u64 = 0x40;

/// Errors raised while decoding a module image.
///
/// These never leave this module: [`extract`] converts them into absent fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// A read ran past the end of the available bytes.
    #[error("truncated image at offset {0:#x}")]
    Truncated(usize),

    /// A required magic value was missing.
    #[error("missing {0} signature")]
    BadSignature(&'static str),

    /// The image uses a layout this reader does not understand.
    #[error("unsupported layout: {0}")]
    Unsupported(String),

    /// A heap or table index pointed outside its target.
    #[error("invalid {what} index {index}")]
    BadIndex {
        /// Kind of index
        what: &'static str,
        /// Offending value
        index: u32,
    },

    /// A string heap entry was not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    BadString(&'static str),
}

/// Identity fields extracted from a module.
///
/// All fields are optional: a native PE has no assembly identity, a
/// resource-only assembly usually has no target framework, and so on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleMetadata {
    /// Target machine decoded from the COFF header
    pub architecture: Option<Architecture>,
    /// Version from the assembly identity
    pub assembly_version: Option<ModuleVersion>,
    /// Free-form version string from the version resource
    pub file_version: Option<String>,
    /// Localization tag, [`NEUTRAL_CULTURE`] when the assembly declares none
    pub culture: Option<String>,
    /// Canonical target framework moniker, e.g. `.NETCoreApp,Version=v9.0`
    pub framework: Option<String>,
}

/// Extract module metadata from an in-memory image.
///
/// Returns `None` when the bytes are not a PE image at all. A PE image that is
/// not managed (no CLI header) still yields architecture and file version.
#[must_use]
pub fn extract(bytes: &[u8]) -> Option<ModuleMetadata> {
    let image = match PeImage::parse(bytes) {
        Ok(image) => image,
        Err(e) => {
            log::trace!("Not a module: {}", e);
            return None;
        }
    };

    let cli = CliHeader::read(&image).unwrap_or_else(|e| {
        log::trace!("Unreadable CLI header: {}", e);
        None
    });

    let mut meta = ModuleMetadata {
        architecture: image.architecture(cli.as_ref().map(|c| c.flags)),
        ..ModuleMetadata::default()
    };

    if let Some(cli) = cli {
        match Metadata::read(&image, &cli) {
            Ok(metadata) => apply_managed_identity(&mut meta, &metadata),
            Err(e) => log::trace!("Unreadable metadata: {}", e),
        }
    }

    meta.file_version = version_info::file_version(&image).unwrap_or_else(|e| {
        log::trace!("Unreadable version resource: {}", e);
        None
    });

    Some(meta)
}

/// Fill the managed-only fields of `meta`.
fn apply_managed_identity(meta: &mut ModuleMetadata, metadata: &Metadata<'_>) {
    match metadata.assembly() {
        Ok(Some(identity)) => {
            meta.assembly_version = Some(identity.version);
            meta.culture = Some(
                identity
                    .culture
                    .unwrap_or_else(|| NEUTRAL_CULTURE.to_string()),
            );
        }
        Ok(None) => {}
        Err(e) => log::trace!("Unreadable assembly row: {}", e),
    }

    meta.framework = framework::declared_framework(metadata).or_else(|| {
        match metadata.assembly_refs() {
            Ok(refs) => framework::infer_framework(&refs),
            Err(e) => {
                log::trace!("Unreadable assembly references: {}", e);
                None
            }
        }
    });
}

/// Extract module metadata from a file on disk.
///
/// I/O failures are treated like any other extraction failure: the result is
/// `None` and the caller leaves the module fields empty.
#[must_use]
pub fn extract_file(path: &Path) -> Option<ModuleMetadata> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::debug!("Cannot open {} for metadata: {}", path.display(), e);
            return None;
        }
    };

    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    if len < MIN_IMAGE_SIZE {
        return None;
    }

    // SAFETY: the map is read-only and dropped before returning. A file that is
    // rewritten during the scan can only produce bytes the parser rejects.
    let map = match unsafe { Mmap::map(&file) } {
        Ok(map) => map,
        Err(e) => {
            log::debug!("Cannot map {} for metadata: {}", path.display(), e);
            return None;
        }
    };

    extract(&map)
}

// Little-endian readers shared by the decoders. All bounds are checked.

pub(crate) fn bytes_at(data: &[u8], at: usize, len: usize) -> Result<&[u8], MetadataError> {
    at.checked_add(len)
        .and_then(|end| data.get(at..end))
        .ok_or(MetadataError::Truncated(at))
}

pub(crate) fn le_u8(data: &[u8], at: usize) -> Result<u8, MetadataError> {
    data.get(at).copied().ok_or(MetadataError::Truncated(at))
}

pub(crate) fn le_u16(data: &[u8], at: usize) -> Result<u16, MetadataError> {
    let b = bytes_at(data, at, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn le_u32(data: &[u8], at: usize) -> Result<u32, MetadataError> {
    let b = bytes_at(data, at, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn le_u64(data: &[u8], at: usize) -> Result<u64, MetadataError> {
    let b = bytes_at(data, at, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(b);
    Ok(u64::from_le_bytes(raw))
}

pub(crate) fn align4(value: usize) -> usize {
    (value + 3) & !3
}
