//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements
//! [`ProgressCallback`] to display a spinner while a release is hashed and a
//! bar while manifests load or files are merged. In silent mode every bar
//! is hidden; warnings and errors still go through the logger.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress callback for the dedup pipeline phases.
///
/// Implement this trait to receive progress updates while fingerprint maps
/// are built and files are merged. Implementations must be thread-safe:
/// hashing workers report concurrently.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (a release root, "manifests", "merge")
    /// * `total` - Total number of items, or 0 when unknown up front
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Number of items finished so far (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Terminal progress reporter.
///
/// Phases run one after another, so one active bar is enough.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    silent: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `silent` - If true, no progress will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use reldedup::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// assert!(progress.is_silent());
    /// ```
    #[must_use]
    pub fn new(silent: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            silent,
        }
    }

    /// Whether output is suppressed.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix} [{elapsed_precise}] {pos} files {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░")
    }

    fn new_bar(&self, phase: &str, total: usize) -> ProgressBar {
        let bar = if total == 0 {
            let bar = ProgressBar::new_spinner().with_style(Self::spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::new(total as u64).with_style(Self::bar_style())
        };
        if self.silent {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_prefix(phase.to_string());
        bar
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        let bar = self.new_bar(phase, total);
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(previous) = guard.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref bar) = *guard {
                bar.set_position(current as u64);
                if !self.silent {
                    bar.set_message(path.to_string());
                }
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
        log::debug!("Phase finished: {}", phase);
    }
}
