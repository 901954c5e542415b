//! Progress reporting using indicatif.
//!
//! The catalog reports two phases through [`ProgressCallback`]:
//! `walking` (file discovery, total unknown) and `cataloging` (fingerprint
//! and metadata per file). [`Progress`] draws them as a spinner and a bar on
//! stderr.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::scanner::catalog::{PHASE_CATALOGING, PHASE_WALKING};

/// Receiver of catalog progress events.
///
/// Implementations must tolerate calls from several worker threads at once.
pub trait ProgressCallback: Send + Sync {
    /// A phase starts. `total` is 0 when unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Item number `current` (1-based) of the running phase is being
    /// processed. Calls may arrive out of order.
    fn on_progress(&self, current: usize, path: &str);

    /// An item of `bytes` bytes has been fully processed.
    fn on_item_completed(&self, _bytes: u64) {}

    fn on_phase_end(&self, phase: &str);

    /// Free-form status message.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress reporter.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    cataloging: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; `quiet` disables all drawing.
    ///
    /// ```
    /// use asmdupe::progress::{Progress, ProgressCallback};
    ///
    /// let progress = Progress::new(true);
    /// progress.on_phase_start("walking", 0);
    /// progress.on_phase_end("walking");
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        let multi = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::stderr())
        };
        Self {
            multi,
            walking: Mutex::new(None),
            cataloging: Mutex::new(None),
            quiet,
        }
    }

    fn walking_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn cataloging_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    /// Lock a bar slot, recovering from a poisoned lock.
    fn slot(slot: &Mutex<Option<ProgressBar>>) -> MutexGuard<'_, Option<ProgressBar>> {
        slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn active_bar(&self) -> Option<ProgressBar> {
        Self::slot(&self.cataloging)
            .clone()
            .or_else(|| Self::slot(&self.walking).clone())
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        match phase {
            PHASE_WALKING => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::walking_style());
                pb.set_message("Walking analysis root");
                pb.enable_steady_tick(Duration::from_millis(100));
                *Self::slot(&self.walking) = Some(pb);
            }
            PHASE_CATALOGING => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::cataloging_style());
                pb.set_message("Cataloging");
                *Self::slot(&self.cataloging) = Some(pb);
            }
            other => log::debug!("Ignoring unknown progress phase {}", other),
        }
    }

    fn on_progress(&self, _current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active_bar() {
            pb.set_message(truncate_path(path, 30));
        }
    }

    fn on_item_completed(&self, _bytes: u64) {
        if self.quiet {
            return;
        }
        if let Some(pb) = Self::slot(&self.cataloging).as_ref() {
            pb.inc(1);
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        match phase {
            PHASE_WALKING => {
                if let Some(pb) = Self::slot(&self.walking).take() {
                    pb.finish_and_clear();
                }
            }
            PHASE_CATALOGING => {
                if let Some(pb) = Self::slot(&self.cataloging).take() {
                    pb.finish_with_message("Cataloging complete");
                }
            }
            _ => {}
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active_bar() {
            pb.set_message(message.to_string());
        }
    }
}

/// Shorten a path to its file name when it is longer than `max_len`.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count >= max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_path_unchanged() {
        assert_eq!(truncate_path("/a/b.dll", 30), "/a/b.dll");
    }

    #[test]
    fn test_truncate_keeps_file_name() {
        let path = "/very/long/path/to/the/shared/runtime/System.Runtime.dll";
        assert_eq!(truncate_path(path, 30), ".../System.Runtime.dll");
    }

    #[test]
    fn test_truncate_long_file_name() {
        let path = "/x/System.Private.ServiceModel.Primitives.Extended.dll";
        let short = truncate_path(path, 20);
        assert!(short.starts_with("..."));
        assert_eq!(short.chars().count(), 20);
    }

    #[test]
    fn test_quiet_progress_is_inert() {
        let progress = Progress::new(true);
        progress.on_phase_start(PHASE_CATALOGING, 3);
        progress.on_progress(1, "/a.dll");
        progress.on_item_completed(10);
        progress.on_phase_end(PHASE_CATALOGING);
        assert!(progress.active_bar().is_none());
    }

    #[test]
    fn test_phase_bars_lifecycle() {
        let progress = Progress {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            walking: Mutex::new(None),
            cataloging: Mutex::new(None),
            quiet: false,
        };
        progress.on_phase_start(PHASE_CATALOGING, 2);
        progress.on_item_completed(1);
        progress.on_item_completed(1);
        assert_eq!(progress.active_bar().map(|pb| pb.position()), Some(2));
        progress.on_phase_end(PHASE_CATALOGING);
        assert!(progress.active_bar().is_none());
    }
}
