//! Layered configuration.
//!
//! Sources, later ones win:
//!
//! 1. built-in defaults
//! 2. TOML file (`--config PATH`, else `config.toml` in the platform config
//!    directory; a missing file is skipped)
//! 3. environment variables prefixed `ASMDUPE_` (`__` separates nested keys)
//! 4. CLI flags, applied by [`Config::apply_analyze_args`]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::AnalyzeArgs;
use crate::scanner::hasher::DEFAULT_MMAP_THRESHOLD;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ASMDUPE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads for fingerprinting
    pub io_threads: usize,
    /// Groups in the top list
    pub top_n: usize,
    /// Extensions that mark module files, without the dot
    pub module_extensions: Vec<String>,
    pub follow_symlinks: bool,
    /// Gitignore-style patterns relative to the analysis root
    pub ignore_patterns: Vec<String>,
    /// Hash large files through a memory map
    pub use_mmap: bool,
    pub mmap_threshold: u64,
    /// Delete permanently instead of moving to the trash
    pub permanent_delete: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_threads: 4,
            top_n: 10,
            module_extensions: vec!["dll".to_string(), "exe".to_string()],
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            permanent_delete: false,
        }
    }
}

impl Config {
    /// The figment for defaults, the TOML file at `path` and the environment.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Fails when the file or the environment holds invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path().ok(),
        };
        let config: Self = Self::figment(path.as_deref())
            .extract()
            .context("Invalid configuration")?;
        log::debug!("Configuration loaded from {:?}", path);
        Ok(config.normalized())
    }

    /// Clamp values and canonicalise extensions.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.io_threads = self.io_threads.max(1);
        self.module_extensions = self
            .module_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Let explicit `analyze` flags override the loaded values.
    pub fn apply_analyze_args(&mut self, args: &AnalyzeArgs) {
        if let Some(threads) = args.io_threads {
            self.io_threads = usize::from(threads);
        }
        if let Some(top) = args.top {
            self.top_n = top;
        }
        if args.follow_symlinks {
            self.follow_symlinks = true;
        }
        if args.permanent {
            self.permanent_delete = true;
        }
        if let Some(threshold) = args.mmap_threshold {
            self.mmap_threshold = threshold;
        }
        self.ignore_patterns
            .extend(args.ignore_patterns.iter().cloned());
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails on serialization or I/O errors.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Cannot serialize configuration")?;
        fs::write(path, content).with_context(|| format!("Cannot write {}", path.display()))?;
        Ok(())
    }

    /// Default platform-specific configuration file.
    ///
    /// # Errors
    ///
    /// Fails when no home directory can be determined.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "asmdupe", "asmdupe")
            .context("Failed to determine project directories")?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}
