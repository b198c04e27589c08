//! # Progress Tracking and Statistics Module
//!
//! Progress bar and per-run counters.
//!
//! ## Components:
//! - `ProgressManager`: `indicatif` bar over the in-scope file count
//! - `Summary`: counters for one batch run, updated from each
//!   `TranscodeOutcome`
//!
//! ## Counters:
//! - **entries_seen**: every entry yielded by the walk
//! - **directories_mirrored**: directories created (or found) in the output
//! - **processed**: in-scope files attempted
//! - **skipped**: files rejected by the scope filter
//! - **succeeded / failed_unreadable / failed_other**: outcome of each attempt
//! - **bytes_read / bytes_written**: sizes of successful transcodes
//!
//! `processed == succeeded + failed_unreadable + failed_other` always holds.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) [OK] photo.jpg
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::file_manager::FileManager;
use crate::optimizer::task_optimizer::TranscodeOutcome;

/// Manages the progress bar of a run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Bar that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Counters of one batch run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub entries_seen: usize,
    pub directories_mirrored: usize,
    pub processed: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed_unreadable: usize,
    pub failed_other: usize,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// The run was stopped before the walk completed
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a file outcome
    pub fn record(&mut self, outcome: &TranscodeOutcome) {
        match outcome {
            TranscodeOutcome::Success {
                bytes_written,
                original_size,
                ..
            } => {
                self.processed += 1;
                self.succeeded += 1;
                self.bytes_read += original_size;
                self.bytes_written += bytes_written;
            }
            TranscodeOutcome::SkippedNotInScope => self.skipped += 1,
            TranscodeOutcome::FailedUnreadable { .. } => {
                self.processed += 1;
                self.failed_unreadable += 1;
            }
            TranscodeOutcome::FailedOther { .. } => {
                self.processed += 1;
                self.failed_other += 1;
            }
        }
    }

    pub fn record_directory(&mut self) {
        self.directories_mirrored += 1;
    }

    pub fn failed(&self) -> usize {
        self.failed_unreadable + self.failed_other
    }

    /// Size reduction of successful transcodes, negative when output grew
    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_read, self.bytes_written)
    }

    /// Successful files per second
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.succeeded as f64 / secs
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Succeeded: {} | Skipped: {} | Unreadable: {} | Failed: {} | {} -> {} ({:.2}% smaller){}",
            self.processed,
            self.succeeded,
            self.skipped,
            self.failed_unreadable,
            self.failed_other,
            FileManager::format_size(self.bytes_read),
            FileManager::format_size(self.bytes_written),
            self.reduction_percent(),
            if self.cancelled { " | CANCELLED" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processor::DetectedFormat;

    #[test]
    fn test_summary_invariant() {
        let mut summary = Summary::new();
        summary.record(&TranscodeOutcome::Success {
            bytes_written: 50,
            original_size: 200,
            detected_format: DetectedFormat::Jpeg,
        });
        summary.record(&TranscodeOutcome::SkippedNotInScope);
        summary.record(&TranscodeOutcome::FailedUnreadable {
            cause: "text".to_string(),
        });
        summary.record(&TranscodeOutcome::FailedOther {
            detected_format: None,
            cause: "io".to_string(),
        });

        assert_eq!(summary.processed, 3);
        assert_eq!(
            summary.processed,
            summary.succeeded + summary.failed_unreadable + summary.failed_other
        );
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.reduction_percent(), 75.0);
    }

    #[test]
    fn test_format_summary_flags_cancellation() {
        let mut summary = Summary::new();
        assert!(!summary.format_summary().contains("CANCELLED"));
        summary.cancelled = true;
        assert!(summary.format_summary().contains("CANCELLED"));
    }
}
