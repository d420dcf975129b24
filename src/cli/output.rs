//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars,
//! status messages and errors to the user.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::OnceLock;

use crate::core::executor::{BuildObserver, BuildPackageResult, BuildResult};
use crate::core::package::PackageInfo;

static GLOBAL: OnceLock<OutputConfig> = OnceLock::new();

/// How much to print, decided by the global flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Only errors
    pub quiet: bool,
    /// Machine readable output on stdout
    pub json: bool,
    /// Verbosity level from `-v` occurrences
    pub verbose: u8,
}

impl OutputConfig {
    /// Create an output configuration from the global flags
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make this configuration the one returned by [`OutputConfig::global`]
    pub fn apply_global(self) {
        let _ = GLOBAL.set(self);
    }

    /// The configuration applied at startup, or the default one
    pub fn global() -> Self {
        GLOBAL.get().copied().unwrap_or_default()
    }

    /// Lowest tracing level shown
    pub fn log_level(&self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        }
    }

    /// Whether human readable progress and summaries are printed
    pub fn is_interactive(&self) -> bool {
        !self.quiet && !self.json
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {cause}");
    }
}

/// Create a progress bar for build steps
pub fn create_build_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} packages ({msg})")
            .expect("Invalid progress bar template")
            .progress_chars("█▓▒░"),
    );
    pb
}

/// Build observer driving a progress bar
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    /// Observer for `total` packages; hidden unless output is interactive
    pub fn new(total: usize, output: OutputConfig) -> Self {
        let bar = if output.is_interactive() {
            create_build_bar(total as u64)
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl BuildObserver for ProgressObserver {
    fn package_started(&self, package_info: &PackageInfo) {
        tracing::info!("Building {} ({})", package_info.name, package_info.directory());
        self.bar.set_message(package_info.name.clone());
    }

    fn package_finished(&self, result: &BuildPackageResult) {
        let line = match result.build_result {
            BuildResult::Success => format!("{} {}", status::SUCCESS, result.package),
            BuildResult::Failure => format!(
                "{} {}: {}",
                status::ERROR,
                result.package,
                result.error.as_deref().unwrap_or("failed")
            ),
            BuildResult::NotBuilt => format!(
                "{} {}: not built, a dependency failed",
                status::WARNING,
                result.package
            ),
        };
        if result.build_result == BuildResult::Failure {
            tracing::warn!("{line}");
        }
        self.bar.println(line);
        self.bar.inc(1);
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
