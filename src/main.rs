//! # jpeg-mirror - Main Entry Point
//!
//! ## Responsibilities:
//! - Parse the command line with `clap` (`convert`, `compress`, `audit`)
//! - Initialize `tracing` logging (console, optional log file)
//! - Load the configuration file and apply CLI flags on top
//! - Wire Ctrl-C to the run's cancellation channel
//! - Report the result (human or JSON) and set the exit code
//!
//! ## Usage:
//! ```bash
//! jpeg-mirror convert ./photos --output ./output/fixed_jpeg
//! jpeg-mirror compress ./photos --quality 80 --yes
//! jpeg-mirror audit ./photos --compare-content --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use jpeg_mirror::config::{EncoderKind, OutputPolicy};
use jpeg_mirror::json_output::JsonMessage;
use jpeg_mirror::{logging, BatchTranscoder, Config, DuplicateAuditor, RunContext};

#[derive(Parser)]
#[command(name = "jpeg-mirror", version)]
#[command(about = "Normalize, recompress and audit JPEG photo trees into mirrored output directories")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to <DIR>/<timestamp>/<command>.log
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Output progress and results as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode every .jpg/.jpeg file as a full-fidelity JPEG (quality 100, 4:4:4)
    Convert {
        /// Directory tree to convert
        input: PathBuf,

        /// Output root mirroring the input tree
        #[arg(short, long, default_value = "output/fixed_jpeg")]
        output: PathBuf,

        /// Reuse a non-empty output directory, replacing mirrored files
        #[arg(long)]
        overwrite: bool,

        /// JPEG encoder
        #[arg(long, value_enum)]
        encoder: Option<EncoderKind>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Recompress every .jpg/.jpeg file at a lower quality
    Compress {
        /// Directory tree to compress
        input: PathBuf,

        /// JPEG quality (0-100) [default: 90 or the config file value]
        #[arg(short, long)]
        quality: Option<u8>,

        /// Output root; defaults to <output-base>/<timestamp>_<input name>_<quality>
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Parent of the generated output directory
        #[arg(long, default_value = "output/compressed")]
        output_base: PathBuf,

        /// Reuse a non-empty output directory, replacing mirrored files
        #[arg(long)]
        overwrite: bool,

        /// JPEG encoder
        #[arg(long, value_enum)]
        encoder: Option<EncoderKind>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Report JPEG files that share a base name across the tree
    Audit {
        /// Directory tree to audit
        input: PathBuf,

        /// Hash duplicate files to tell identical copies from name collisions
        #[arg(long)]
        compare_content: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Convert { .. } => "convert",
            Command::Compress { .. } => "compress",
            Command::Audit { .. } => "audit",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(cli.verbose, cli.log_dir.as_deref(), cli.command.name())?;

    let json = cli.json;
    let result = run(cli).await;
    if let Err(ref e) = result {
        if json {
            JsonMessage::error(e.to_string(), Some(format!("{:#}", e))).emit();
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Command::Convert {
            input,
            output,
            overwrite,
            encoder,
            no_progress,
        } => {
            let mut config = Config::full_fidelity();
            config.encoder = encoder.unwrap_or(file_config.encoder);
            apply_run_flags(&mut config, &file_config, overwrite, no_progress, cli.json);

            transcode(config, &input, &output, "convert").await
        }

        Command::Compress {
            input,
            quality,
            output,
            output_base,
            overwrite,
            encoder,
            yes,
            no_progress,
        } => {
            let mut config = file_config.clone();
            config.quality = quality.unwrap_or(file_config.quality);
            if let Some(encoder) = encoder {
                config.encoder = encoder;
            }
            apply_run_flags(&mut config, &file_config, overwrite, no_progress, cli.json);
            config.validate()?;

            let output = output.unwrap_or_else(|| timestamped_output(&output_base, &input, config.quality));
            info!("Input directory: {}", input.display());
            info!("Output directory: {}", output.display());
            info!("JPEG quality: {}", config.quality);

            if !yes && !confirm("Run compression? (y/n): ")? {
                info!("Compression cancelled");
                return Ok(());
            }

            transcode(config, &input, &output, "compress").await
        }

        Command::Audit { input, compare_content } => {
            let (_stop_sender, mut ctx) = run_context("audit", cli.json, false);
            let report = DuplicateAuditor::new()
                .with_content_comparison(compare_content)
                .audit(&input, &mut ctx)
                .await
                .with_context(|| format!("Audit of {} failed", input.display()))?;

            if cli.json {
                JsonMessage::audit(input, report).emit();
            } else {
                println!("{}", report.format_table(&input));
            }
            Ok(())
        }
    }
}

/// Load `--config`, or the default config file when present
async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file does not exist: {}", path.display());
            }
            Config::from_file(path).await
        }
        None => match Config::default_path() {
            Some(default_path) => Config::from_file(&default_path).await,
            None => Ok(Config::default()),
        },
    }
}

fn apply_run_flags(config: &mut Config, file_config: &Config, overwrite: bool, no_progress: bool, json: bool) {
    config.output_policy = if overwrite {
        OutputPolicy::Overwrite
    } else {
        file_config.output_policy
    };
    config.show_progress = file_config.show_progress && !no_progress;
    config.json_output = json || file_config.json_output;
}

async fn transcode(config: Config, input: &Path, output: &Path, operation: &'static str) -> Result<()> {
    let (_stop_sender, mut ctx) = run_context(operation, config.json_output, config.show_progress);

    let transcoder = BatchTranscoder::with_default_codec(config);
    let summary = transcoder
        .run(input, output, &mut ctx)
        .await
        .with_context(|| format!("{} of {} failed", operation, input.display()))?;

    if !ctx.json_output {
        println!("{}", summary.format_summary());
    }
    Ok(())
}

/// Build a run context whose cancellation is triggered by Ctrl-C
fn run_context(
    operation: &'static str,
    json_output: bool,
    show_progress: bool,
) -> (tokio::sync::broadcast::Sender<()>, RunContext) {
    let (stop_sender, stop_receiver) = RunContext::create_cancellation_channel();

    let signal_sender = stop_sender.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current file");
            let _ = signal_sender.send(());
        }
    });

    let ctx = RunContext::new(operation)
        .with_cancellation(stop_receiver)
        .with_json_output(json_output)
        .with_progress(show_progress);
    (stop_sender, ctx)
}

/// `<base>/<YYYYmmdd_HHMMSS>_<input dir name>_<quality>`
fn timestamped_output(base: &Path, input: &Path, quality: u8) -> PathBuf {
    let input_name = input
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .or_else(|| input.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "input".to_string());

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    base.join(format!("{}_{}_{}", timestamp, input_name, quality))
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{}", prompt);
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
