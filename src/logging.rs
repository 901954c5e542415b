//! Logging setup for the `log` facade with the `env_logger` backend.
//!
//! Level selection, first match wins:
//!
//! 1. `RUST_LOG`, when set
//! 2. `--quiet`: errors only
//! 3. `-vv`: trace, `-v`: debug
//! 4. info
//!
//! Per-file recoverable problems are logged at debug or trace, so a default
//! run stays silent about them.

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialise logging once, before any other work.
///
/// Calling it twice is harmless: the second initialisation is ignored.
///
/// ```rust,no_run
/// asmdupe::logging::init_logging(1, false);
/// log::debug!("visible at -v");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var_os("RUST_LOG").is_some();

    let mut builder = Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }
    configure_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return;
    }
    log::debug!(
        "Logging initialised at {} ({})",
        current_level_name(),
        if from_env { "RUST_LOG" } else { "flags" }
    );
}

/// Map CLI verbosity flags to a level. `quiet` beats `verbose`.
fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Debug builds get timestamps (and the module path from `-v` on); release
/// builds print `LEVEL message`.
fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    builder.format(move |buf, record| {
        let style = buf.default_level_style(record.level());
        let timestamp = buf.timestamp_seconds();
        if verbose >= 1 {
            writeln!(
                buf,
                "{timestamp} {style}{:<5}{style:#} [{}] {}",
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{timestamp} {style}{:<5}{style:#} {}",
                record.level(),
                record.args()
            )
        }
    });

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(buf, "{style}{:<5}{style:#} {}", record.level(), record.args())
        });
    }
}

/// Name of the active maximum level.
#[must_use]
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
