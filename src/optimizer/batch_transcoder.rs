//! # Batch Transcoder
//!
//! Main orchestrator: walks the input tree, mirrors every directory under the
//! output root and transcodes each in-scope file, one entry at a time.
//!
//! ## Run sequence
//! 1. Validate the input root (fatal when missing or not a directory)
//! 2. Apply the `OutputPolicy` and create the output root
//! 3. Walk the input tree (an output root nested inside it is pruned)
//! 4. Per entry: check for cancellation, then mirror the directory or
//!    transcode the file, recording a `TranscodeOutcome`
//! 5. Return the `Summary`
//!
//! Only step 1 and 2 can fail the run. Everything after is recorded per entry.

use crate::{
    config::{Config, OutputPolicy},
    context::RunContext,
    error::TranscodeError,
    file_manager::{FileManager, TreeWalker},
    image_processor::{ImageCodec, ImageProcessor, RustCodec},
    json_output::{JsonConfig, JsonMessage},
    optimizer::{path_resolver::PathResolver, progress_tracker::ProgressTracker, task_optimizer::TaskOptimizer},
    progress::Summary,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Mirrors an input tree into an output tree, normalizing every JPEG-named file
pub struct BatchTranscoder {
    config: Config,
    codec: Arc<dyn ImageCodec>,
}

impl BatchTranscoder {
    pub fn new(config: Config, codec: Arc<dyn ImageCodec>) -> Self {
        Self { config, codec }
    }

    /// Transcoder using the `image`-based codec with the configured encoder
    pub fn with_default_codec(config: Config) -> Self {
        let codec = Arc::new(RustCodec::new(config.encoder));
        Self::new(config, codec)
    }

    /// Run the batch over `input_root`, writing under `output_root`
    pub async fn run(
        &self,
        input_root: &Path,
        output_root: &Path,
        ctx: &mut RunContext,
    ) -> Result<Summary, TranscodeError> {
        let span = ctx.span().clone();
        self.run_inner(input_root, output_root, ctx).instrument(span).await
    }

    async fn run_inner(
        &self,
        input_root: &Path,
        output_root: &Path,
        ctx: &mut RunContext,
    ) -> Result<Summary, TranscodeError> {
        let start_time = Instant::now();

        self.config.validate()?;
        validate_input_root(input_root).await?;
        self.prepare_output_root(output_root).await?;

        let excluded = PathResolver::nested_under(input_root, output_root);
        if let Some(ref excluded) = excluded {
            info!("Output directory is inside the input tree, skipping {}", excluded.display());
        }

        let total_files = if ctx.progress_enabled() || ctx.json_output {
            count_in_scope(input_root, excluded.as_deref())
        } else {
            0
        };

        self.log_configuration(input_root, output_root);
        if ctx.json_output {
            JsonMessage::start(
                input_root.to_path_buf(),
                output_root.to_path_buf(),
                total_files,
                JsonConfig::from(&self.config),
            )
            .emit();
        }

        let worker = TaskOptimizer::new(
            ImageProcessor::new(Arc::clone(&self.codec)),
            self.config.encode_options(),
            input_root.to_path_buf(),
            output_root.to_path_buf(),
        );
        let mut tracker = ProgressTracker::new(total_files, ctx);
        let mut cancelled = false;

        let mut walker = TreeWalker::new(input_root);
        if let Some(excluded) = excluded {
            walker = walker.excluding(excluded);
        }

        for entry in walker {
            if ctx.should_stop() {
                warn!("Run cancelled, stopping before the next entry");
                cancelled = true;
                break;
            }
            tracker.entry_seen();

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| input_root.to_path_buf());
                    warn!(source = %path.display(), cause = %e, "Failed to read directory entry");
                    tracker.entry_failed(&path, e.to_string());
                    continue;
                }
            };

            if entry.is_dir() {
                match worker.process_directory(&entry).await {
                    Ok(_) => tracker.directory_mirrored(),
                    Err(cause) => {
                        warn!(source = %entry.path.display(), cause = %cause, "Failed to mirror directory");
                        tracker.entry_failed(&entry.path, cause);
                    }
                }
                continue;
            }

            let outcome = worker.process_file(&entry).await;
            tracker.handle_file_completion(&entry.path, &outcome);
        }

        let summary = tracker.finish(start_time.elapsed(), cancelled);
        if !ctx.json_output {
            print_final_stats(&summary);
        }
        Ok(summary)
    }

    /// Enforce the output policy, then create the output root with its ancestors
    async fn prepare_output_root(&self, output_root: &Path) -> Result<(), TranscodeError> {
        let output_error = |source| TranscodeError::OutputRoot {
            path: output_root.to_path_buf(),
            source,
        };

        if self.config.output_policy == OutputPolicy::FailIfNotEmpty
            && !FileManager::is_empty_dir(output_root).map_err(output_error)?
        {
            return Err(TranscodeError::OutputNotEmpty(output_root.to_path_buf()));
        }

        tokio::fs::create_dir_all(output_root).await.map_err(output_error)?;
        debug!("Output root ready: {}", output_root.display());
        Ok(())
    }

    fn log_configuration(&self, input_root: &Path, output_root: &Path) {
        info!("Input directory: {}", input_root.display());
        info!("Output directory: {}", output_root.display());
        info!(
            "JPEG quality: {} | subsampling: {} | optimize: {} | encoder: {}",
            self.config.quality, self.config.subsampling, self.config.optimize, self.config.encoder
        );
        match self.config.output_policy {
            OutputPolicy::FailIfNotEmpty => debug!("Output policy: refuse non-empty output directory"),
            OutputPolicy::Overwrite => info!("Overwrite mode: existing output files will be replaced"),
        }
    }
}

async fn validate_input_root(input_root: &Path) -> Result<(), TranscodeError> {
    match tokio::fs::metadata(input_root).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(TranscodeError::InputRootNotDirectory(input_root.to_path_buf())),
        Err(_) => Err(TranscodeError::InputRootMissing(input_root.to_path_buf())),
    }
}

/// Number of in-scope files under `root`, for the progress bar
fn count_in_scope(root: &Path, excluded: Option<&Path>) -> usize {
    let mut walker = TreeWalker::new(root);
    if let Some(excluded) = excluded {
        walker = walker.excluding(excluded);
    }
    walker
        .filter_map(Result::ok)
        .filter(|entry| !entry.is_dir() && FileManager::is_in_scope(entry))
        .count()
}

fn print_final_stats(summary: &Summary) {
    info!("=== Transcoding Complete ===");
    info!("Entries seen: {}", summary.entries_seen);
    info!("Directories mirrored: {}", summary.directories_mirrored);
    info!("Files processed: {}", summary.processed);
    info!("Files succeeded: {}", summary.succeeded);
    info!("Files skipped (not JPEG): {}", summary.skipped);
    info!("Unreadable files: {}", summary.failed_unreadable);
    info!("Failed files: {}", summary.failed_other);
    info!(
        "Size: {} -> {} ({:.2}% reduction)",
        FileManager::format_size(summary.bytes_read),
        FileManager::format_size(summary.bytes_written),
        summary.reduction_percent()
    );
    info!(
        "Elapsed: {:.2}s ({:.2} files/s)",
        summary.elapsed.as_secs_f64(),
        summary.files_per_second()
    );
    if summary.cancelled {
        warn!("Run was cancelled before completion");
    }
}
