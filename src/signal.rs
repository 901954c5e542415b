//! Ctrl+C handling.
//!
//! A single `Arc<AtomicBool>` is raised on interrupt. The walker, the hasher
//! and the catalog poll it and stop iterating, after which the run exits
//! with code 130.
//!
//! ```rust,no_run
//! use asmdupe::signal::install_handler;
//!
//! let handler = install_handler();
//! let flag = handler.get_flag();
//! // pass `flag` to CatalogConfig::with_shutdown_flag
//! # drop(flag);
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler with no shutdown requested and no signal hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the flag for worker components.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Hook Ctrl+C to a process-wide [`ShutdownHandler`].
///
/// The hook is installed once per process; later calls reset and return the
/// same handler, so repeated `run_app` calls in one test binary work. If the
/// hook cannot be installed the handler still works for manual requests.
pub fn install_handler() -> ShutdownHandler {
    let handler = GLOBAL_HANDLER.get_or_init(|| {
        let handler = ShutdownHandler::new();
        let hook = handler.clone();
        let hooked = ctrlc::set_handler(move || {
            hook.request_shutdown();
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\nInterrupted. Stopping scan...");
            let _ = stderr.flush();
            log::info!("Shutdown signal received");
        });
        if let Err(e) = hooked {
            log::debug!("Ctrl+C hook not installed: {}", e);
        }
        handler
    });
    handler.reset();
    handler.clone()
}
