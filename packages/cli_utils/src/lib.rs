#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the crash forecast tools.
//!
//! Provides an `indicatif` bar that renders [`TrainingProgress`] events,
//! a bar for pipeline steps, and [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while progress bars redraw.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crash_forecast_forecast::progress::{RegionOutcome, TrainingProgress};
use indicatif::{ProgressDrawTarget, ProgressStyle};

pub use indicatif::{MultiProgress, ProgressBar};

/// An `indicatif` [`ProgressBar`] that renders region training.
///
/// Starts as a spinner and becomes a bar with ETA once the region count is
/// known. Skipped and failed regions are tallied in the bar's message.
pub struct RegionTrainingBar {
    bar: ProgressBar,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl RegionTrainingBar {
    /// Adds a region training bar to `multi`.
    #[must_use]
    pub fn new(multi: &MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.yellow} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Preparing regions");

        Self {
            bar,
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }
}

impl TrainingProgress for RegionTrainingBar {
    fn started(&self, regions: u64) {
        self.bar.set_length(regions);
        self.bar.set_position(0);
        self.bar.set_style(
            ProgressStyle::with_template(
                "  {msg} {wide_bar:.yellow/dim} {pos}/{len} {percent}% [{eta}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        self.bar.set_message("Regions");
    }

    fn region_finished(&self, region: &str, outcome: RegionOutcome) {
        match outcome {
            RegionOutcome::Trained => {}
            RegionOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            RegionOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.bar.set_message(format!(
            "{region} ({} skipped, {} failed)",
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        ));
        self.bar.inc(1);
    }

    fn finished(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }
}

/// Creates a bar for pipeline steps (load, join, train, save) whose count
/// is known up front.
#[must_use]
pub fn steps_bar(multi: &MultiProgress, message: &str, total: u64) -> ProgressBar {
    let bar = multi.add(ProgressBar::new(total));
    bar.set_style(
        ProgressStyle::with_template("{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    bar.set_message(message.to_string());
    bar
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
/// With `quiet`, bars are hidden and only log lines are printed.
#[must_use]
pub fn init_logger(quiet: bool) -> MultiProgress {
    let multi = if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(level);

    multi
}
