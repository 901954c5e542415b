//! Removal of non-canonical duplicates.
//!
//! # Overview
//!
//! The engine decides which paths go ([`DuplicateAnalysis::removal_plan`]);
//! this module does the deleting:
//! - Move to system trash (default, recoverable)
//! - Permanent deletion (explicit flag)
//! - Size check against the catalog before each deletion
//!
//! Failures are collected in a [`BatchDeleteResult`] and never stop the
//! batch.
//!
//! # Example
//!
//! ```no_run
//! use asmdupe::actions::delete::{removal_targets, delete_batch, DeleteConfig};
//! use asmdupe::duplicates::DuplicateAnalysis;
//!
//! # let analysis = DuplicateAnalysis::default();
//! let targets = removal_targets(&analysis)?;
//! let result = delete_batch(&targets, &DeleteConfig::trash());
//! println!("{}", result.summary());
//! # Ok::<(), asmdupe::actions::DeleteError>(())
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::duplicates::DuplicateAnalysis;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File size differs from the catalog.
    #[error("file changed since scan: {path} ({expected} bytes, now {actual})")]
    Modified {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed { path: PathBuf, message: String },

    /// A plan would remove every member of a group.
    #[error("refusing to delete all copies of {0}")]
    AllCopiesWouldBeDeleted(String),

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    fn from_io(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }

    /// Path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified { path: p, .. }
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::AllCopiesWouldBeDeleted(_) => None,
        }
    }
}

/// A file scheduled for removal and the size the catalog recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalTarget {
    pub path: PathBuf,
    pub expected_size: u64,
}

/// One deleted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub path: PathBuf,
    pub size: u64,
    /// `false` when moved to the trash
    pub permanent: bool,
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    pub successes: Vec<DeleteResult>,
    /// Failed deletions with their error message
    pub failures: Vec<(PathBuf, String)>,
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let freed = bytesize::ByteSize::b(self.bytes_freed);
        if self.all_succeeded() {
            format!("Deleted {} file(s), freed {}", self.success_count(), freed)
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.success_count(),
                self.failure_count(),
                freed
            )
        }
    }
}

/// Configuration for deletion operations.
///
/// Every target's size is checked against the catalog before it is removed.
#[derive(Debug, Clone, Default)]
pub struct DeleteConfig {
    /// Use permanent deletion instead of trash.
    pub permanent: bool,
}

impl DeleteConfig {
    #[must_use]
    pub fn trash() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn permanent() -> Self {
        Self { permanent: true }
    }
}

/// Build the removal targets of an analysis, checking that every group
/// keeps at least one member.
///
/// # Errors
///
/// [`DeleteError::AllCopiesWouldBeDeleted`] if some group would be emptied.
pub fn removal_targets(analysis: &DuplicateAnalysis) -> Result<Vec<RemovalTarget>, DeleteError> {
    let mut targets = Vec::new();
    for group in analysis.groups() {
        let selected: Vec<&Path> = group.duplicates().map(|(f, _)| f.path.as_path()).collect();
        let members: Vec<&Path> = group.group.files.iter().map(|f| f.path.as_path()).collect();
        validate_preserves_copy(&selected, &members, &group.group.key.filename)?;

        targets.extend(group.duplicates().map(|(f, _)| RemovalTarget {
            path: f.path.clone(),
            expected_size: f.size,
        }));
    }
    Ok(targets)
}

/// Check that `selected` leaves at least one of `members` in place.
///
/// # Errors
///
/// [`DeleteError::AllCopiesWouldBeDeleted`] naming `label`.
pub fn validate_preserves_copy(selected: &[&Path], members: &[&Path], label: &str) -> Result<(), DeleteError> {
    let selected: HashSet<&Path> = selected.iter().copied().collect();
    let preserved = members.iter().filter(|p| !selected.contains(*p)).count();
    if preserved == 0 {
        log::error!("Plan would delete all {} copies of {}", members.len(), label);
        return Err(DeleteError::AllCopiesWouldBeDeleted(label.to_string()));
    }
    Ok(())
}

/// Return the current size of `path`, failing if it differs from `expected`.
///
/// # Errors
///
/// [`DeleteError::Modified`] on a size change, or the I/O error.
pub fn verify_size(path: &Path, expected: u64) -> Result<u64, DeleteError> {
    let actual = fs::metadata(path)
        .map_err(|e| DeleteError::from_io(path, e))?
        .len();
    if actual != expected {
        log::warn!(
            "File changed since scan: {} ({} → {} bytes)",
            path.display(),
            expected,
            actual
        );
        return Err(DeleteError::Modified {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(actual)
}

/// Move one file to the system trash.
///
/// # Errors
///
/// [`DeleteError::NotFound`], [`DeleteError::PermissionDenied`] or
/// [`DeleteError::TrashFailed`].
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::metadata(path)
        .map_err(|e| DeleteError::from_io(path, e))?
        .len();

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: false,
    })
}

/// Remove one file for good.
///
/// # Errors
///
/// [`DeleteError::NotFound`], [`DeleteError::PermissionDenied`] or
/// [`DeleteError::PermanentDeleteFailed`].
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::metadata(path)
        .map_err(|e| DeleteError::from_io(path, e))?
        .len();

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: true,
    })
}

fn delete_one(target: &RemovalTarget, config: &DeleteConfig) -> Result<DeleteResult, DeleteError> {
    verify_size(&target.path, target.expected_size)?;
    if config.permanent {
        permanent_delete(&target.path)
    } else {
        delete_to_trash(&target.path)
    }
}

/// Delete every target, collecting failures.
#[must_use]
pub fn delete_batch(targets: &[RemovalTarget], config: &DeleteConfig) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();

    for target in targets {
        match delete_one(target, config) {
            Ok(deleted) => {
                result.bytes_freed += deleted.size;
                result.successes.push(deleted);
            }
            Err(e) => {
                log::warn!("Failed to delete {}: {}", target.path.display(), e);
                result.failures.push((target.path.clone(), e.to_string()));
            }
        }
    }

    log::info!("{}", result.summary());
    result
}
