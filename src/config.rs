//! # Configuration Management Module
//!
//! Encoding and run settings shared by the `convert` and `compress` operations.
//!
//! ## Parameters:
//! - `quality`: JPEG quality (0-100). `convert` uses 100, `compress` defaults to 90
//! - `subsampling`: chroma subsampling written by the encoder
//! - `optimize`: Huffman table optimization (mozjpeg encoder only)
//! - `encoder`: which JPEG encoder writes the output
//! - `output_policy`: what to do when the output root already holds files
//! - `json_output`: emit JSON events on stdout instead of human output
//! - `show_progress`: draw a progress bar while transcoding
//!
//! ## Presets:
//! ```rust
//! use jpeg_mirror::config::Config;
//!
//! let lossless = Config::full_fidelity();
//! let smaller = Config::compression(75);
//! assert!(smaller.validate().is_ok());
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::image_processor::{EncodeOptions, OutputFormat};

/// Default quality for the compression operation
pub const DEFAULT_COMPRESS_QUALITY: u8 = 90;

/// Quality used for full-fidelity conversion
pub const FULL_FIDELITY_QUALITY: u8 = 100;

/// Chroma subsampling of the encoded JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaSubsampling {
    /// 4:4:4, no chroma loss
    Full444,
    /// 4:2:2
    Half422,
    /// 4:2:0
    Quarter420,
}

impl fmt::Display for ChromaSubsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromaSubsampling::Full444 => write!(f, "4:4:4"),
            ChromaSubsampling::Half422 => write!(f, "4:2:2"),
            ChromaSubsampling::Quarter420 => write!(f, "4:2:0"),
        }
    }
}

/// JPEG encoder implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    /// Baseline encoder of the `image` crate (always 4:4:4)
    Image,
    /// mozjpeg, requires the `mozjpeg` feature
    Mozjpeg,
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderKind::Image => write!(f, "image"),
            EncoderKind::Mozjpeg => write!(f, "mozjpeg"),
        }
    }
}

/// Policy for an output root that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Refuse to run when the output root exists and is not empty
    FailIfNotEmpty,
    /// Reuse the output root, replacing mirrored files
    Overwrite,
}

/// Configuration for a transcoding run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG quality (0-100)
    pub quality: u8,
    /// Chroma subsampling of the output
    pub subsampling: ChromaSubsampling,
    /// Optimize Huffman tables for size
    pub optimize: bool,
    /// Encoder implementation
    pub encoder: EncoderKind,
    /// Behaviour when the output root already has content
    pub output_policy: OutputPolicy,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::compression(DEFAULT_COMPRESS_QUALITY)
    }
}

impl Config {
    /// Settings for lossless-as-possible normalization to JPEG
    pub fn full_fidelity() -> Self {
        Self {
            quality: FULL_FIDELITY_QUALITY,
            subsampling: ChromaSubsampling::Full444,
            optimize: false,
            encoder: EncoderKind::Image,
            output_policy: OutputPolicy::FailIfNotEmpty,
            json_output: false,
            show_progress: true,
        }
    }

    /// Settings for size-reducing recompression at `quality`
    pub fn compression(quality: u8) -> Self {
        Self {
            quality,
            subsampling: ChromaSubsampling::Quarter420,
            optimize: true,
            encoder: EncoderKind::Image,
            output_policy: OutputPolicy::FailIfNotEmpty,
            json_output: false,
            show_progress: true,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality > 100 {
            return Err(ConfigError::Quality(self.quality));
        }
        Ok(())
    }

    /// Encoder options derived from this configuration
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            format: OutputFormat::Jpeg,
            quality: self.quality,
            subsampling: self.subsampling,
            optimize: self.optimize,
            encoder: self.encoder,
        }
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jpeg-mirror").join("config.json"))
    }

    /// Load configuration from file; a missing file yields the defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
