//! # Task Optimizer Module
//!
//! Handles one walked entry: mirrors directories, filters files by scope and
//! turns the codec result into a `TranscodeOutcome`. Per-entry errors stop
//! here; nothing in this module returns an error to the batch loop.

use crate::{
    error::CodecError,
    file_manager::{DirectoryEntry, FileManager},
    image_processor::{DetectedFormat, EncodeOptions, ImageProcessor},
    optimizer::path_resolver::PathResolver,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Size change (percent) above which a file is reported as notable
const NOTABLE_CHANGE_PERCENT: f64 = 70.0;
/// Source size above which a file is reported as notable
const NOTABLE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// Processing time above which a file is reported as notable
const NOTABLE_DURATION: Duration = Duration::from_secs(5);

/// One file to transcode
#[derive(Debug, Clone)]
pub struct TranscodeTask {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub options: EncodeOptions,
}

/// Result of processing one file entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Success {
        bytes_written: u64,
        original_size: u64,
        detected_format: DetectedFormat,
    },
    SkippedNotInScope,
    /// Content is not an image this build can read
    FailedUnreadable { cause: String },
    /// I/O, decode or encode failure
    FailedOther {
        detected_format: Option<DetectedFormat>,
        cause: String,
    },
}

impl TranscodeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedUnreadable { .. } | Self::FailedOther { .. })
    }

    /// Short tag used in progress messages and JSON events
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "ok",
            Self::SkippedNotInScope => "skipped",
            Self::FailedUnreadable { .. } => "unreadable",
            Self::FailedOther { .. } => "failed",
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::FailedUnreadable { cause } | Self::FailedOther { cause, .. } => Some(cause),
            _ => None,
        }
    }

    fn from_codec_error(detected_format: Option<DetectedFormat>, error: &CodecError) -> Self {
        if error.is_unreadable() {
            Self::FailedUnreadable {
                cause: error.to_string(),
            }
        } else {
            Self::FailedOther {
                detected_format,
                cause: error.to_string(),
            }
        }
    }
}

/// Per-entry worker bound to one input/output root pair
pub struct TaskOptimizer {
    processor: ImageProcessor,
    options: EncodeOptions,
    input_root: PathBuf,
    output_root: PathBuf,
}

impl TaskOptimizer {
    pub fn new(processor: ImageProcessor, options: EncodeOptions, input_root: PathBuf, output_root: PathBuf) -> Self {
        Self {
            processor,
            options,
            input_root,
            output_root,
        }
    }

    /// Create the mirror of a directory entry. Idempotent.
    pub async fn process_directory(&self, entry: &DirectoryEntry) -> Result<PathBuf, String> {
        let destination = PathResolver::mirror(&self.input_root, &self.output_root, &entry.path)
            .map_err(|e| e.to_string())?;

        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|e| format!("Failed to create directory {}: {}", destination.display(), e))?;

        debug!("Mirrored directory {}", destination.display());
        Ok(destination)
    }

    /// Scope-filter and transcode a file entry
    pub async fn process_file(&self, entry: &DirectoryEntry) -> TranscodeOutcome {
        if !FileManager::is_in_scope(entry) {
            debug!("Skipping out-of-scope file {}", entry.path.display());
            return TranscodeOutcome::SkippedNotInScope;
        }

        let destination = match PathResolver::mirror(&self.input_root, &self.output_root, &entry.path) {
            Ok(destination) => destination,
            Err(e) => {
                return self.record_failure(
                    &entry.path,
                    TranscodeOutcome::FailedOther {
                        detected_format: None,
                        cause: e.to_string(),
                    },
                )
            }
        };

        if let Err(e) = PathResolver::ensure_parent_dirs(&destination).await {
            return self.record_failure(
                &entry.path,
                TranscodeOutcome::FailedOther {
                    detected_format: None,
                    cause: format!("Failed to create parent directories for {}: {}", destination.display(), e),
                },
            );
        }

        let task = TranscodeTask {
            source: entry.path.clone(),
            destination,
            options: self.options.clone(),
        };

        let started = Instant::now();
        match self.processor.transcode(&task).await {
            Ok(success) => {
                debug!(
                    source = %task.source.display(),
                    destination = %task.destination.display(),
                    format = %success.detected_format,
                    "Transcoded {} -> {}",
                    FileManager::format_size(success.original_size),
                    FileManager::format_size(success.bytes_written)
                );
                log_if_notable(&task.source, success.original_size, success.bytes_written, started.elapsed());

                TranscodeOutcome::Success {
                    bytes_written: success.bytes_written,
                    original_size: success.original_size,
                    detected_format: success.detected_format,
                }
            }
            Err(failure) => self.record_failure(
                &task.source,
                TranscodeOutcome::from_codec_error(failure.detected_format, &failure.error),
            ),
        }
    }

    fn record_failure(&self, source: &Path, outcome: TranscodeOutcome) -> TranscodeOutcome {
        match &outcome {
            TranscodeOutcome::FailedUnreadable { cause } => {
                warn!(source = %source.display(), cause = %cause, "Unreadable image, skipped");
            }
            TranscodeOutcome::FailedOther { detected_format, cause } => {
                let format = detected_format
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                warn!(source = %source.display(), format = %format, cause = %cause, "Failed to transcode");
            }
            _ => {}
        }
        outcome
    }
}

/// Log files with a large size change, a large source or a slow transcode
fn log_if_notable(source: &Path, original_size: u64, bytes_written: u64, elapsed: Duration) {
    let change = FileManager::calculate_reduction(original_size, bytes_written);

    if change.abs() > NOTABLE_CHANGE_PERCENT || original_size > NOTABLE_SIZE_BYTES || elapsed > NOTABLE_DURATION {
        info!(
            "Notable file {}: {} -> {} ({:+.1}%) in {:.2}s",
            source.display(),
            FileManager::format_size(original_size),
            FileManager::format_size(bytes_written),
            -change,
            elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::file_manager::EntryKind;
    use crate::image_processor::tests::{jpeg_bytes, png_bytes};
    use crate::image_processor::RustCodec;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn optimizer(input: &Path, output: &Path) -> TaskOptimizer {
        TaskOptimizer::new(
            ImageProcessor::new(Arc::new(RustCodec::default())),
            Config::full_fidelity().encode_options(),
            input.to_path_buf(),
            output.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_outcomes_by_entry_kind() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        std::fs::create_dir_all(input.join("sub")).unwrap();
        std::fs::write(input.join("sub/good.jpg"), jpeg_bytes(10, 10, 90)).unwrap();
        std::fs::write(input.join("sub/fake.jpg"), b"definitely not a jpeg").unwrap();
        std::fs::write(input.join("sub/pic.png"), png_bytes(10, 10)).unwrap();

        let worker = optimizer(&input, &output);
        let file = |name: &str| DirectoryEntry::new(&input, &input.join(name), EntryKind::File);

        let dir = DirectoryEntry::new(&input, &input.join("sub"), EntryKind::Directory);
        assert_eq!(worker.process_directory(&dir).await.unwrap(), output.join("sub"));

        let outcome = worker.process_file(&file("sub/good.jpg")).await;
        assert!(matches!(
            outcome,
            TranscodeOutcome::Success { detected_format: DetectedFormat::Jpeg, .. }
        ));
        assert!(output.join("sub/good.jpg").is_file());

        let outcome = worker.process_file(&file("sub/fake.jpg")).await;
        assert!(matches!(outcome, TranscodeOutcome::FailedUnreadable { .. }));
        assert!(outcome.is_failure());
        assert!(!output.join("sub/fake.jpg").exists());

        let outcome = worker.process_file(&file("sub/pic.png")).await;
        assert_eq!(outcome, TranscodeOutcome::SkippedNotInScope);
        assert!(!outcome.is_failure());
        assert!(!output.join("sub/pic.png").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_other_failure() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        std::fs::create_dir_all(&input).unwrap();

        let worker = optimizer(&input, &temp.path().join("out"));
        let entry = DirectoryEntry::new(&input, &input.join("vanished.jpg"), EntryKind::File);

        let outcome = worker.process_file(&entry).await;
        assert_eq!(outcome.label(), "failed");
        assert!(outcome.cause().is_some());
    }
}
