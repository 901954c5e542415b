//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Analyze the shared runtime directory of an extracted SDK image
//! asmdupe analyze ./dotnet-sdk --subdir shared
//!
//! # CSV listing of every duplicate, cross-framework report on the console
//! asmdupe analyze ./dotnet-sdk --output csv --csv-file dupes.csv --cross-framework
//!
//! # Non-module files, then remove the duplicates to the trash
//! asmdupe analyze ./dotnet-sdk --scan non-assemblies --remove-duplicates
//!
//! # Show what the metadata reader sees
//! asmdupe inspect ./dotnet-sdk/sdk/9.0.100/dotnet.dll
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::scanner::ScanClass;

/// Duplicate-resolution engine for .NET distribution images.
///
/// Finds logically duplicated modules (same file name, culture and target
/// framework), picks one copy to keep and explains every other copy.
#[derive(Debug, Parser)]
#[command(name = "asmdupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON objects on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicate groups under a directory
    Analyze(AnalyzeArgs),
    /// Show the metadata and fingerprint of individual files
    Inspect(InspectArgs),
    /// Show or initialise the configuration
    Config(ConfigArgs),
}

/// Arguments for the analyze subcommand.
#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Root of the extracted distribution image
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Analyze only ROOT/REL
    #[arg(long, value_name = "REL")]
    pub subdir: Option<PathBuf>,

    /// Which files to look at
    #[arg(long = "scan", value_enum, default_value = "assemblies")]
    pub scan_class: ScanClassArg,

    /// Report format
    #[arg(short, long, value_enum, default_value = "console")]
    pub output: OutputFormat,

    /// Write the CSV listing here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub csv_file: Option<PathBuf>,

    /// Number of groups in the top list (default from config: 10)
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Also report modules built for several frameworks
    #[arg(long)]
    pub cross_framework: bool,

    /// Delete every non-canonical duplicate after the report
    #[arg(long)]
    pub remove_duplicates: bool,

    /// Delete permanently instead of moving to the trash
    #[arg(long, requires = "remove_duplicates")]
    pub permanent: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Worker threads for fingerprinting (default from config: 4)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub io_threads: Option<u16>,

    /// Gitignore-style pattern to skip, relative to the analysis root
    /// (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Size at which files are hashed through a memory map (e.g. 64MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub mmap_threshold: Option<u64>,
}

/// Arguments for the inspect subcommand.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Files to inspect
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the default configuration to the config path
    #[arg(long)]
    pub init: bool,
}

/// Scan class as a CLI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanClassArg {
    /// Module files (by extension)
    Assemblies,
    /// Everything else
    NonAssemblies,
}

impl From<ScanClassArg> for ScanClass {
    fn from(arg: ScanClassArg) -> Self {
        match arg {
            ScanClassArg::Assemblies => Self::Assemblies,
            ScanClassArg::NonAssemblies => Self::NonAssemblies,
        }
    }
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Console,
    /// One row per duplicate group member
    Csv,
    /// Full report as a JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// ```
/// use asmdupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("64MiB").unwrap(), 64 * 1_048_576);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
