//! The file catalog: one [`FileDescriptor`] per file under an analysis root.
//!
//! # Overview
//!
//! The catalog walks the root, keeps the files of the requested
//! [`ScanClass`], fingerprints each one and runs module metadata extraction
//! on it. Two drivers share the same per-file step:
//!
//! - [`Catalog::iter`] is lazy and sequential; consumers can start grouping
//!   before the walk finishes.
//! - [`Catalog::collect_parallel`] walks first, then describes files on a
//!   rayon pool sized by `io_threads`.
//!
//! Metadata problems never fail the scan. A file that cannot be fingerprinted
//! does: the error names the path and iteration stops.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::hasher::{Hasher, DEFAULT_MMAP_THRESHOLD};
use super::walker::{Walker, WalkerConfig};
use super::{FileDescriptor, FileEntry, HashError, ScanClass};
use crate::metadata;
use crate::progress::ProgressCallback;

/// Phase name reported while walking the tree.
pub const PHASE_WALKING: &str = "walking";
/// Phase name reported while fingerprinting and extracting.
pub const PHASE_CATALOGING: &str = "cataloging";

/// Errors that end a catalog scan.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The analysis root does not exist.
    #[error("Root not found: {0}")]
    RootNotFound(PathBuf),

    /// The requested subdirectory does not exist under the root.
    #[error("Subdirectory not found: {0}")]
    SubdirNotFound(PathBuf),

    /// The root or subdirectory is a file.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file could not be fingerprinted.
    #[error("Cannot fingerprint {}: {source}", .source.path().display())]
    Hash {
        #[from]
        source: HashError,
    },

    /// The worker pool could not be created.
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Shutdown was requested before the scan completed.
    #[error("Scan interrupted")]
    Interrupted,
}

/// Configuration for a catalog scan.
#[derive(Clone)]
pub struct CatalogConfig {
    /// Which files to keep
    pub scan_class: ScanClass,
    /// Extensions that make a file a module (no dot, any case)
    pub module_extensions: Vec<String>,
    /// Walk options
    pub walker: WalkerConfig,
    /// Hash large files through a memory map
    pub use_mmap: bool,
    /// Size at which memory-mapped hashing starts
    pub mmap_threshold: u64,
    /// Worker threads for [`Catalog::collect_parallel`]
    pub io_threads: usize,
    /// Shutdown flag for Ctrl+C handling
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress reporting
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("scan_class", &self.scan_class)
            .field("module_extensions", &self.module_extensions)
            .field("walker", &self.walker)
            .field("use_mmap", &self.use_mmap)
            .field("mmap_threshold", &self.mmap_threshold)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new(ScanClass::Assemblies)
    }
}

impl CatalogConfig {
    #[must_use]
    pub fn new(scan_class: ScanClass) -> Self {
        Self {
            scan_class,
            module_extensions: vec!["dll".to_string(), "exe".to_string()],
            walker: WalkerConfig::default(),
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            io_threads: 4,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    #[must_use]
    pub fn with_module_extensions(mut self, extensions: Vec<String>) -> Self {
        self.module_extensions = extensions;
        self
    }

    #[must_use]
    pub fn with_walker(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    #[must_use]
    pub fn with_mmap(mut self, enabled: bool, threshold: u64) -> Self {
        self.use_mmap = enabled;
        self.mmap_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// A validated analysis root ready to be scanned.
#[derive(Debug)]
pub struct Catalog {
    root: PathBuf,
    config: CatalogConfig,
    hasher: Hasher,
}

impl Catalog {
    /// Validate `root` (and `root/subdir` when given) before any file is read.
    ///
    /// # Errors
    ///
    /// [`CatalogError::RootNotFound`], [`CatalogError::SubdirNotFound`] or
    /// [`CatalogError::NotADirectory`].
    pub fn open(root: &Path, subdir: Option<&Path>, config: CatalogConfig) -> Result<Self, CatalogError> {
        if !root.exists() {
            return Err(CatalogError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(CatalogError::NotADirectory(root.to_path_buf()));
        }

        let analysis_root = match subdir {
            Some(sub) => {
                let joined = root.join(sub);
                if !joined.exists() {
                    return Err(CatalogError::SubdirNotFound(joined));
                }
                if !joined.is_dir() {
                    return Err(CatalogError::NotADirectory(joined));
                }
                joined
            }
            None => root.to_path_buf(),
        };

        let mut hasher = Hasher::new()
            .with_mmap(config.use_mmap)
            .with_mmap_threshold(config.mmap_threshold);
        if let Some(flag) = &config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }

        Ok(Self {
            root: analysis_root,
            config,
            hasher,
        })
    }

    /// The directory actually scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn scan_class(&self) -> ScanClass {
        self.config.scan_class
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Files of the configured scan class, in walk order.
    fn entries(&self) -> impl Iterator<Item = FileEntry> + '_ {
        let mut walker = Walker::new(&self.root, self.config.walker.clone());
        if let Some(flag) = &self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        let scan_class = self.config.scan_class;
        let extensions = self.config.module_extensions.clone();

        walker
            .walk()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(move |entry| scan_class.includes(&entry.path, &extensions))
    }

    /// Fingerprint one file and extract its metadata.
    fn describe(&self, entry: &FileEntry) -> Result<FileDescriptor, CatalogError> {
        let (size, hash) = self.hasher.fingerprint(&entry.path).map_err(|e| match e {
            HashError::Interrupted(_) => CatalogError::Interrupted,
            e => {
                log::error!("Failed to fingerprint {}: {}", entry.path.display(), e);
                CatalogError::from(e)
            }
        })?;

        let metadata = metadata::extract_file(&entry.path);
        if metadata.is_none() {
            log::trace!("Not a module: {}", entry.path.display());
        }

        if let Some(callback) = &self.config.progress_callback {
            callback.on_item_completed(size);
        }
        Ok(FileDescriptor::new(entry.path.clone(), size, hash, metadata))
    }

    /// Lazily describe every file, in walk order.
    ///
    /// The iterator yields at most one error and then stops.
    pub fn iter(&self) -> impl Iterator<Item = Result<FileDescriptor, CatalogError>> + '_ {
        self.describe_each(self.entries())
    }

    fn describe_each<'a>(
        &'a self,
        mut entries: impl Iterator<Item = FileEntry> + 'a,
    ) -> impl Iterator<Item = Result<FileDescriptor, CatalogError>> + 'a {
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            if self.is_shutdown_requested() {
                done = true;
                return Some(Err(CatalogError::Interrupted));
            }
            let Some(entry) = entries.next() else {
                done = true;
                return self
                    .is_shutdown_requested()
                    .then_some(Err(CatalogError::Interrupted));
            };
            let result = self.describe(&entry);
            done = result.is_err();
            Some(result)
        })
    }

    /// Describe every file on a worker pool.
    ///
    /// The output is in walk order, same as [`Catalog::iter`].
    ///
    /// # Errors
    ///
    /// The first fingerprinting failure, or [`CatalogError::Interrupted`].
    pub fn collect_parallel(&self) -> Result<Vec<FileDescriptor>, CatalogError> {
        let progress = self.config.progress_callback.as_deref();

        if let Some(p) = progress {
            p.on_phase_start(PHASE_WALKING, 0);
        }
        let entries: Vec<FileEntry> = self.entries().collect();
        if let Some(p) = progress {
            p.on_phase_end(PHASE_WALKING);
        }
        if self.is_shutdown_requested() {
            return Err(CatalogError::Interrupted);
        }
        log::info!("Found {} files to catalog", entries.len());

        self.describe_parallel(&entries)
    }

    fn describe_parallel(&self, entries: &[FileEntry]) -> Result<Vec<FileDescriptor>, CatalogError> {
        let progress = self.config.progress_callback.as_deref();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .build()?;

        if let Some(p) = progress {
            p.on_phase_start(PHASE_CATALOGING, entries.len());
        }
        let started = AtomicUsize::new(0);
        let result = pool.install(|| {
            entries
                .par_iter()
                .map(|entry| {
                    if self.is_shutdown_requested() {
                        return Err(CatalogError::Interrupted);
                    }
                    if let Some(p) = progress {
                        let current = started.fetch_add(1, Ordering::SeqCst) + 1;
                        p.on_progress(current, entry.path.to_string_lossy().as_ref());
                    }
                    self.describe(entry)
                })
                .collect::<Result<Vec<_>, _>>()
        });
        if let Some(p) = progress {
            p.on_phase_end(PHASE_CATALOGING);
        }

        // A worker may have seen the flag before others hit a real error
        match result {
            Err(_) if self.is_shutdown_requested() => Err(CatalogError::Interrupted),
            other => other,
        }
    }
}
