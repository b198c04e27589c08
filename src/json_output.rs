//! # JSON Output Module
//!
//! Structured events on stdout for programmatic consumers (`--json`).
//! One JSON object per line, tagged by `type`.
//!
//! ## Message types:
//! - `start`: a transcoding run begins
//! - `file_complete`: one in-scope file was attempted
//! - `complete`: the run finished, with final counters
//! - `audit`: full duplicate audit report
//! - `error`: fatal error before or during a run

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::auditor::AuditReport;
use crate::config::Config;
use crate::image_processor::DetectedFormat;
use crate::optimizer::task_optimizer::TranscodeOutcome;
use crate::progress::Summary;

/// JSON event
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Start of a transcoding run
    #[serde(rename = "start")]
    Start {
        input_dir: PathBuf,
        output_dir: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    /// One file attempted
    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        status: String,
        detected_format: Option<DetectedFormat>,
        original_size: u64,
        output_size: u64,
        reduction_percent: f64,
        error: Option<String>,
    },

    /// Run completed (or cancelled)
    #[serde(rename = "complete")]
    Complete {
        entries_seen: usize,
        directories_mirrored: usize,
        files_processed: usize,
        files_succeeded: usize,
        files_skipped: usize,
        files_unreadable: usize,
        files_failed: usize,
        bytes_read: u64,
        bytes_written: u64,
        reduction_percent: f64,
        duration_seconds: f64,
        cancelled: bool,
    },

    /// Duplicate audit report
    #[serde(rename = "audit")]
    Audit {
        input_dir: PathBuf,
        report: AuditReport,
    },

    /// General error
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Encoding settings echoed in the `start` event
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub quality: u8,
    pub subsampling: String,
    pub optimize: bool,
    pub encoder: String,
}

impl JsonMessage {
    /// Emit the message on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input_dir: PathBuf, output_dir: PathBuf, total_files: usize, config: JsonConfig) -> Self {
        Self::Start {
            input_dir,
            output_dir,
            total_files,
            config,
        }
    }

    /// Event for a file outcome; `None` for skipped files, which are not reported
    pub fn file_complete(path: PathBuf, outcome: &TranscodeOutcome) -> Option<Self> {
        let message = match outcome {
            TranscodeOutcome::SkippedNotInScope => return None,
            TranscodeOutcome::Success {
                bytes_written,
                original_size,
                detected_format,
            } => Self::FileComplete {
                path,
                status: outcome.label().to_string(),
                detected_format: Some(detected_format.clone()),
                original_size: *original_size,
                output_size: *bytes_written,
                reduction_percent: crate::file_manager::FileManager::calculate_reduction(
                    *original_size,
                    *bytes_written,
                ),
                error: None,
            },
            TranscodeOutcome::FailedUnreadable { cause } => Self::FileComplete {
                path,
                status: outcome.label().to_string(),
                detected_format: None,
                original_size: 0,
                output_size: 0,
                reduction_percent: 0.0,
                error: Some(cause.clone()),
            },
            TranscodeOutcome::FailedOther { detected_format, cause } => Self::FileComplete {
                path,
                status: outcome.label().to_string(),
                detected_format: detected_format.clone(),
                original_size: 0,
                output_size: 0,
                reduction_percent: 0.0,
                error: Some(cause.clone()),
            },
        };
        Some(message)
    }

    pub fn complete(summary: &Summary) -> Self {
        Self::Complete {
            entries_seen: summary.entries_seen,
            directories_mirrored: summary.directories_mirrored,
            files_processed: summary.processed,
            files_succeeded: summary.succeeded,
            files_skipped: summary.skipped,
            files_unreadable: summary.failed_unreadable,
            files_failed: summary.failed_other,
            bytes_read: summary.bytes_read,
            bytes_written: summary.bytes_written,
            reduction_percent: summary.reduction_percent(),
            duration_seconds: summary.elapsed.as_secs_f64(),
            cancelled: summary.cancelled,
        }
    }

    pub fn audit(input_dir: PathBuf, report: AuditReport) -> Self {
        Self::Audit { input_dir, report }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            quality: config.quality,
            subsampling: config.subsampling.to_string(),
            optimize: config.optimize,
            encoder: config.encoder.to_string(),
        }
    }
}
