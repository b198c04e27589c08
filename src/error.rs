//! # Error Types Module
//!
//! Typed errors for every boundary of the crate.
//!
//! ## Categories:
//! - `TranscodeError`: fatal conditions that abort a whole run (missing input
//!   root, non-empty output root, output root not creatable)
//! - `CodecError`: failure of a single decode/encode; classified into
//!   "unreadable" (content is not a recognised image) and everything else
//! - `MirrorError`: a path that cannot be mapped under the output root
//! - `ConfigError`: invalid configuration values
//!
//! Per-entry errors (`CodecError`, `MirrorError`) never escape a run: the
//! batch transcoder turns them into a `TranscodeOutcome`. Only
//! `TranscodeError` reaches the caller.

use std::path::PathBuf;

use crate::image_processor::DetectedFormat;

/// Fatal errors that stop a run before or while it starts
#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("Input directory does not exist: {}", .0.display())]
    InputRootMissing(PathBuf),

    #[error("Input path is not a directory: {}", .0.display())]
    InputRootNotDirectory(PathBuf),

    #[error("Output directory already exists and is not empty: {} (use --overwrite to reuse it)", .0.display())]
    OutputNotEmpty(PathBuf),

    #[error("Failed to prepare output directory {}: {source}", .path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Failure of a single codec operation
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("content is not a recognised image format")]
    Unrecognized,

    #[error("{0} content detected but no decoder is available ({1})")]
    UnsupportedFormat(DetectedFormat, &'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Codec task failed: {0}")]
    Task(String),
}

impl CodecError {
    /// True when the source could not be identified as any supported image.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unrecognized | Self::UnsupportedFormat(..))
    }
}

/// A path could not be mirrored under the output root
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MirrorError {
    #[error("{} is not located under {}", .path.display(), .root.display())]
    NotContained { path: PathBuf, root: PathBuf },
}

/// Invalid configuration values
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("quality must be between 0 and 100, got {0}")]
    Quality(u8),
}
