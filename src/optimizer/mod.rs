//! # Optimizer Module
//!
//! Batch transcoding split into submodules:
//! - `batch_transcoder`: main orchestrator of a run
//! - `task_optimizer`: per-entry worker and `TranscodeOutcome`
//! - `progress_tracker`: counters, progress bar and JSON events of a run
//! - `path_resolver`: input-to-output path mapping

pub mod batch_transcoder;
pub mod path_resolver;
pub mod progress_tracker;
pub mod task_optimizer;

pub use batch_transcoder::BatchTranscoder;
pub use path_resolver::PathResolver;
pub use progress_tracker::ProgressTracker;
pub use task_optimizer::{TaskOptimizer, TranscodeOutcome, TranscodeTask};
