//! # Progress Tracking Module
//!
//! Single owner of a run's `Summary`. Each outcome goes through here so the
//! counters, the progress bar and the JSON event stream stay in step.

use crate::{
    context::RunContext,
    json_output::JsonMessage,
    optimizer::task_optimizer::TranscodeOutcome,
    progress::{ProgressManager, Summary},
};
use std::path::Path;
use std::time::Duration;

/// Progress and counters of one sequential run
pub struct ProgressTracker {
    summary: Summary,
    progress_manager: ProgressManager,
    json_output: bool,
}

impl ProgressTracker {
    /// Tracker for `total_files` in-scope files
    pub fn new(total_files: usize, ctx: &RunContext) -> Self {
        let progress_manager = if ctx.progress_enabled() {
            ProgressManager::new(total_files as u64)
        } else {
            ProgressManager::hidden()
        };

        Self {
            summary: Summary::new(),
            progress_manager,
            json_output: ctx.json_output,
        }
    }

    /// Count an entry yielded by the walk
    pub fn entry_seen(&mut self) {
        self.summary.entries_seen += 1;
    }

    pub fn directory_mirrored(&mut self) {
        self.summary.record_directory();
    }

    /// Record a failure that happened outside a file transcode.
    ///
    /// Walk errors and directories are not part of the bar's total, so the
    /// bar does not move.
    pub fn entry_failed(&mut self, path: &Path, cause: String) {
        let outcome = TranscodeOutcome::FailedOther {
            detected_format: None,
            cause,
        };
        self.summary.record(&outcome);
        self.emit_file_complete(path, &outcome);
    }

    /// Record a file outcome, advance the bar and emit its JSON event
    pub fn handle_file_completion(&mut self, path: &Path, outcome: &TranscodeOutcome) {
        self.summary.record(outcome);

        if outcome == &TranscodeOutcome::SkippedNotInScope {
            return;
        }

        self.emit_file_complete(path, outcome);

        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let message = match outcome {
            TranscodeOutcome::Success { detected_format, .. } => format!("[OK] {} ({})", name, detected_format),
            TranscodeOutcome::FailedUnreadable { .. } => format!("[UNREADABLE] {}", name),
            _ => format!("[ERROR] {}", name),
        };
        self.progress_manager.update(&message);
    }

    fn emit_file_complete(&self, path: &Path, outcome: &TranscodeOutcome) {
        if self.json_output {
            if let Some(message) = JsonMessage::file_complete(path.to_path_buf(), outcome) {
                message.emit();
            }
        }
    }

    /// Current counters
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Close the bar and hand back the final counters
    pub fn finish(mut self, elapsed: Duration, cancelled: bool) -> Summary {
        self.summary.elapsed = elapsed;
        self.summary.cancelled = cancelled;
        self.progress_manager.finish(&self.summary.format_summary());

        if self.json_output {
            JsonMessage::complete(&self.summary).emit();
        }
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_outcomes() {
        let ctx = RunContext::new("test");
        let mut tracker = ProgressTracker::new(2, &ctx);

        tracker.entry_seen();
        tracker.directory_mirrored();
        tracker.handle_file_completion(Path::new("a.png"), &TranscodeOutcome::SkippedNotInScope);
        tracker.entry_failed(Path::new("locked"), "permission denied".to_string());

        assert_eq!(tracker.summary().skipped, 1);
        assert_eq!(tracker.summary().failed_other, 1);

        let summary = tracker.finish(Duration::from_secs(2), true);
        assert!(summary.cancelled);
        assert_eq!(summary.entries_seen, 1);
        assert_eq!(summary.directories_mirrored, 1);
        assert_eq!(summary.elapsed, Duration::from_secs(2));
    }

    #[test]
    fn test_entry_failures_do_not_advance_the_bar() {
        let ctx = RunContext::new("test");
        let mut tracker = ProgressTracker::new(1, &ctx);

        tracker.entry_failed(Path::new("unreadable_dir"), "permission denied".to_string());
        tracker.entry_failed(Path::new("out/sub"), "read-only file system".to_string());
        assert_eq!(tracker.progress_manager.position(), 0);
        assert_eq!(tracker.summary().processed, 2);
        assert_eq!(tracker.summary().failed_other, 2);

        tracker.handle_file_completion(
            Path::new("broken.jpg"),
            &TranscodeOutcome::FailedUnreadable {
                cause: "not an image".to_string(),
            },
        );
        tracker.handle_file_completion(Path::new("notes.txt"), &TranscodeOutcome::SkippedNotInScope);
        assert_eq!(tracker.progress_manager.position(), 1);
        assert_eq!(
            tracker.summary().processed,
            tracker.summary().succeeded + tracker.summary().failed_unreadable + tracker.summary().failed_other
        );
    }
}
