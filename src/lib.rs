//! asmdupe - duplicate resolution for .NET distribution images
//!
//! Scans a directory tree of managed modules, groups files that share a
//! name, culture and target framework, keeps one canonical copy per group
//! and reports how much space the rest occupy.
//!
//! The pipeline:
//!
//! 1. [`scanner::Catalog`] walks the tree, fingerprints every file with
//!    BLAKE3 and reads its module identity through [`metadata`]
//! 2. [`duplicates::DuplicateAnalysis`] groups, selects and categorizes
//! 3. [`crossfw`] optionally looks across frameworks
//! 4. [`output`] renders the result and [`actions`] removes duplicates on
//!    request

pub mod actions;
pub mod cli;
pub mod config;
pub mod crossfw;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod version;

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;

use crate::actions::{delete_batch, removal_targets, DeleteConfig};
use crate::cli::{AnalyzeArgs, Cli, Commands, ConfigArgs, InspectArgs, OutputFormat};
use crate::config::Config;
use crate::duplicates::DuplicateAnalysis;
use crate::error::ExitCode;
use crate::output::{ConsoleOutput, CsvOutput, JsonOutput, Report};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::{Catalog, CatalogConfig, FileDescriptor, Hasher, ScanClass, WalkerConfig};

/// Run one CLI invocation.
///
/// # Errors
///
/// Any failure that ends the run; [`ExitCode::for_error`] maps it to a
/// process exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let color = !cli.no_color;
    if !color {
        yansi::disable();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    log::debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Analyze(args) => {
            config.apply_analyze_args(&args);
            run_analyze(&args, &config, cli.quiet, color)
        }
        Commands::Inspect(args) => run_inspect(&args, &config),
        Commands::Config(args) => run_config(&args, &config, cli.config.as_deref()),
    }
}

fn run_analyze(args: &AnalyzeArgs, config: &Config, quiet: bool, color: bool) -> Result<ExitCode> {
    let shutdown = signal::install_handler();
    let show_progress = !quiet && args.output == OutputFormat::Console;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(!show_progress));

    let scan_class = ScanClass::from(args.scan_class);
    let catalog_config = CatalogConfig::new(scan_class)
        .with_module_extensions(config.module_extensions.clone())
        .with_walker(WalkerConfig {
            follow_symlinks: config.follow_symlinks,
            ignore_patterns: config.ignore_patterns.clone(),
        })
        .with_mmap(config.use_mmap, config.mmap_threshold)
        .with_io_threads(config.io_threads)
        .with_shutdown_flag(shutdown.get_flag())
        .with_progress(progress);

    let catalog = Catalog::open(&args.root, args.subdir.as_deref(), catalog_config)
        .with_context(|| format!("Cannot analyze {}", args.root.display()))?;
    log::info!(
        "Analyzing {} ({})",
        catalog.root().display(),
        scan_class.as_str()
    );
    let descriptors = catalog.collect_parallel().context("Scan failed")?;

    let cross = args.cross_framework.then(|| crossfw::analyze(&descriptors));
    let analysis = DuplicateAnalysis::analyze(descriptors);

    let mut report = Report::new(&analysis, catalog.root(), scan_class, config.top_n);
    if let Some(cross) = &cross {
        report = report.with_cross_framework(cross);
    }
    write_report(args, report, color)?;

    if !analysis.has_duplicates() {
        return Ok(ExitCode::NoDuplicates);
    }
    if args.remove_duplicates {
        if shutdown.is_shutdown_requested() {
            log::warn!("Interrupted before removal; nothing was deleted");
            return Ok(ExitCode::Interrupted);
        }
        return remove_duplicates(&analysis, config, args.yes);
    }
    Ok(ExitCode::Success)
}

fn write_report(args: &AnalyzeArgs, report: Report<'_>, color: bool) -> Result<()> {
    let stdout = io::stdout();
    match args.output {
        OutputFormat::Console => ConsoleOutput::new(report)
            .with_color(color)
            .write_to(&mut stdout.lock())
            .context("Cannot write report")?,
        OutputFormat::Json => JsonOutput::new(&report)
            .write_to(&mut stdout.lock())
            .context("Cannot write JSON report")?,
        OutputFormat::Csv if args.csv_file.is_none() => {
            let listing = report.analysis.listing(report.root);
            CsvOutput::new(&listing)
                .write_to(stdout.lock())
                .context("Cannot write CSV listing")?;
        }
        OutputFormat::Csv => {}
    }

    if let Some(path) = &args.csv_file {
        let listing = report.analysis.listing(report.root);
        let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
        CsvOutput::new(&listing)
            .write_to(BufWriter::new(file))
            .with_context(|| format!("Cannot write {}", path.display()))?;
        log::info!("Wrote {} listing rows to {}", listing.len(), path.display());
    }
    Ok(())
}

fn remove_duplicates(analysis: &DuplicateAnalysis, config: &Config, assume_yes: bool) -> Result<ExitCode> {
    let targets = removal_targets(analysis).context("Refusing to remove duplicates")?;
    if targets.is_empty() {
        return Ok(ExitCode::Success);
    }

    let total: u64 = targets.iter().map(|t| t.expected_size).sum();
    let action = if config.permanent_delete {
        "Permanently delete"
    } else {
        "Move to trash"
    };
    let question = format!("{} {} duplicate files ({})?", action, targets.len(), ByteSize::b(total));
    if !assume_yes {
        let stdin = io::stdin();
        if !confirm(&question, &mut stdin.lock(), &mut io::stderr())? {
            log::info!("Removal cancelled");
            return Ok(ExitCode::Success);
        }
    }

    let delete_config = if config.permanent_delete {
        DeleteConfig::permanent()
    } else {
        DeleteConfig::trash()
    };
    let result = delete_batch(&targets, &delete_config);
    for (path, reason) in &result.failures {
        log::error!("Could not remove {}: {}", path.display(), reason);
    }
    log::info!("{}", result.summary());

    if result.all_succeeded() {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::PartialSuccess)
    }
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
fn confirm<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("Cannot read confirmation")?;
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

fn run_inspect(args: &InspectArgs, config: &Config) -> Result<ExitCode> {
    let hasher = Hasher::new()
        .with_mmap(config.use_mmap)
        .with_mmap_threshold(config.mmap_threshold);

    let mut descriptors = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let (size, hash) = hasher
            .fingerprint(path)
            .with_context(|| format!("Cannot fingerprint {}", path.display()))?;
        let metadata = metadata::extract_file(path);
        if metadata.is_none() {
            log::debug!("{} is not a module", path.display());
        }
        descriptors.push(FileDescriptor::new(path.clone(), size, hash, metadata));
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &descriptors).context("Cannot write JSON")?;
        writeln!(out)?;
    } else {
        for descriptor in &descriptors {
            write_inspection(&mut out, descriptor)?;
        }
    }
    Ok(ExitCode::Success)
}

fn write_inspection<W: Write>(out: &mut W, d: &FileDescriptor) -> io::Result<()> {
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    writeln!(out, "{}", d.path.display())?;
    writeln!(out, "  size:             {} ({})", d.size, ByteSize::b(d.size))?;
    writeln!(out, "  hash:             {}", d.hash_hex())?;
    writeln!(out, "  architecture:     {}", or_dash(d.architecture.map(|a| a.to_string())))?;
    writeln!(out, "  assembly version: {}", or_dash(d.assembly_version.map(|v| v.to_string())))?;
    writeln!(out, "  file version:     {}", or_dash(d.file_version.clone()))?;
    writeln!(out, "  culture:          {}", or_dash(d.culture.clone()))?;
    writeln!(out, "  framework:        {}", or_dash(d.framework.clone()))?;
    Ok(())
}

fn run_config(args: &ConfigArgs, config: &Config, explicit: Option<&Path>) -> Result<ExitCode> {
    if !args.init {
        let text = toml::to_string_pretty(config).context("Cannot serialize configuration")?;
        print!("{text}");
        return Ok(ExitCode::Success);
    }

    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    Config::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(ExitCode::Success)
}
