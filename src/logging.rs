//! # Logging Setup
//!
//! Installs the global `tracing` subscriber for the binary.
//!
//! - console layer on stderr (stdout is reserved for JSON events)
//! - `EnvFilter`: `RUST_LOG` when set, otherwise `info` or `debug` (`--verbose`)
//! - optional file layer: `<log_dir>/<YYYY-mm-dd_HH-MM-SS>/<command>.log`,
//!   written through a non-blocking appender whose guard must outlive the run

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Directory of one run's log files under `log_dir`
pub fn run_log_dir(log_dir: &Path) -> PathBuf {
    log_dir.join(chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string())
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>, command: &str) -> Result<Option<WorkerGuard>> {
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(log_dir) => {
            let dir = run_log_dir(log_dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let file_appender = tracing_appender::rolling::never(&dir, format!("{}.log", command));
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
