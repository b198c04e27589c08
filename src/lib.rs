//! # jpeg_mirror
//!
//! Mirrors a directory tree of photos into a new tree, re-encoding every
//! JPEG-named file as a real JPEG, and audits trees for duplicate file names.
//!
//! ## Modules:
//! - `config`: encoding settings, presets and the JSON config file
//! - `error`: typed errors for runs, codecs, path mapping and configuration
//! - `file_manager`: tree walking and the extension scope filter
//! - `image_processor`: codec trait, format detection and atomic writes
//! - `optimizer`: batch transcoder and its per-entry worker
//! - `auditor`: duplicate base-name audit
//! - `context`: per-run span, cancellation and output switches
//! - `progress` / `json_output`: human and machine readable reporting
//! - `logging`: tracing subscriber setup for the binary
//!
//! ## Usage:
//! ```rust,no_run
//! use jpeg_mirror::{BatchTranscoder, Config, RunContext};
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), jpeg_mirror::TranscodeError> {
//! let transcoder = BatchTranscoder::with_default_codec(Config::full_fidelity());
//! let mut ctx = RunContext::new("convert");
//! let summary = transcoder.run(Path::new("photos"), Path::new("output/converted"), &mut ctx).await?;
//! println!("{}", summary.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod auditor;
pub mod config;
pub mod context;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod logging;
pub mod optimizer;
pub mod progress;

pub use auditor::{AuditReport, DuplicateAuditor, DuplicateGroup};
pub use config::Config;
pub use context::RunContext;
pub use error::{CodecError, ConfigError, MirrorError, TranscodeError};
pub use image_processor::{ImageCodec, ImageProcessor, RustCodec};
pub use optimizer::{BatchTranscoder, TranscodeOutcome};
pub use progress::Summary;
