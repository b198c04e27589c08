//! # Image Processing Module
//!
//! Decoding, format detection and JPEG re-encoding for a single file.
//!
//! ## Codec Boundary
//!
//! All pixel work goes through the [`ImageCodec`] trait:
//!
//! - `decode(bytes) -> (DynamicImage, DetectedFormat)`: detects the encoded
//!   format from content (magic bytes), never from the file extension
//! - `encode(&DynamicImage, &EncodeOptions) -> bytes`: writes JPEG with the
//!   requested quality, chroma subsampling and optimization flag
//!
//! [`RustCodec`] is the production implementation built on the `image` crate.
//! Tests swap in mock codecs without touching the batch transcoder.
//!
//! ## Supported Input
//!
//! | Format | Detection | Decode |
//! |--------|-----------|--------|
//! | JPEG, PNG, GIF, WebP, TIFF, BMP | magic bytes | `image` crate |
//! | HEIF/HEIC | `ftyp` brand | `libheif-rs` (feature `heif`) |
//! | anything else | - | `CodecError::Unrecognized` |
//!
//! ## Encoders
//!
//! - **image**: baseline JPEG from the `image` crate. Always 4:4:4, standard
//!   Huffman tables, so `optimize` and `subsampling` have no effect
//! - **mozjpeg** (feature `mozjpeg`): honours subsampling and Huffman
//!   optimization. Without the feature the image encoder is used instead
//!
//! ## Atomic Output
//!
//! The encoded bytes go to a temporary file in the destination directory which
//! is renamed over the destination once complete. A failure at any step drops
//! the temporary file, so no partial output is left behind.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Write};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::{ChromaSubsampling, EncoderKind};
use crate::error::CodecError;
use crate::optimizer::task_optimizer::TranscodeTask;

/// ISO-BMFF brands identifying HEIF/HEIC still images
const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"heim", b"heis", b"mif1", b"msf1", b"heif"];

/// Encoded format found in a file's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedFormat {
    Jpeg,
    Png,
    Gif,
    #[serde(rename = "webp")]
    WebP,
    Tiff,
    Bmp,
    Heif,
    /// Recognised by signature but not one of the formats above
    Other(String),
}

impl DetectedFormat {
    fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::Gif => Self::Gif,
            ImageFormat::WebP => Self::WebP,
            ImageFormat::Tiff => Self::Tiff,
            ImageFormat::Bmp => Self::Bmp,
            other => Self::Other(format!("{:?}", other).to_uppercase()),
        }
    }
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectedFormat::Jpeg => write!(f, "JPEG"),
            DetectedFormat::Png => write!(f, "PNG"),
            DetectedFormat::Gif => write!(f, "GIF"),
            DetectedFormat::WebP => write!(f, "WEBP"),
            DetectedFormat::Tiff => write!(f, "TIFF"),
            DetectedFormat::Bmp => write!(f, "BMP"),
            DetectedFormat::Heif => write!(f, "HEIF"),
            DetectedFormat::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Target format of a transcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Jpeg,
}

/// Encoder settings for one transcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: OutputFormat,
    /// 0-100; 0 is encoded as 1
    pub quality: u8,
    pub subsampling: ChromaSubsampling,
    pub optimize: bool,
    pub encoder: EncoderKind,
}

/// Capability interface over the image codec library
pub trait ImageCodec: Send + Sync {
    /// Decode `bytes`, detecting the encoded format from content.
    fn decode(&self, bytes: &[u8]) -> Result<(DynamicImage, DetectedFormat), CodecError>;

    /// Encode `image` according to `options`.
    fn encode(&self, image: &DynamicImage, options: &EncodeOptions) -> Result<Vec<u8>, CodecError>;
}

/// Codec backed by the `image` crate, with optional libheif and mozjpeg
#[derive(Debug, Clone)]
pub struct RustCodec {
    encoder: EncoderKind,
}

impl RustCodec {
    /// Create a codec using `requested` as the JPEG encoder.
    ///
    /// Falls back to the image encoder when mozjpeg support is not compiled in.
    pub fn new(requested: EncoderKind) -> Self {
        let encoder = match requested {
            EncoderKind::Mozjpeg if !cfg!(feature = "mozjpeg") => {
                warn!("mozjpeg encoder not available in this build, using the image encoder");
                EncoderKind::Image
            }
            other => other,
        };
        Self { encoder }
    }

    /// Encoder actually used by this codec
    pub fn encoder(&self) -> EncoderKind {
        self.encoder
    }

    /// Identify the format of `bytes` without decoding pixels.
    pub fn detect_format(bytes: &[u8]) -> Option<DetectedFormat> {
        match image::guess_format(bytes) {
            Ok(format) => Some(DetectedFormat::from_image_format(format)),
            Err(_) if is_heif(bytes) => Some(DetectedFormat::Heif),
            Err(_) => None,
        }
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new(EncoderKind::Image)
    }
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<(DynamicImage, DetectedFormat), CodecError> {
        let format = Self::detect_format(bytes).ok_or(CodecError::Unrecognized)?;

        let image = match format {
            DetectedFormat::Heif => decode_heif(bytes)?,
            _ => {
                let reader = image::io::Reader::new(Cursor::new(bytes)).with_guessed_format()?;
                reader.decode().map_err(|e| match e {
                    image::ImageError::Unsupported(_) => {
                        CodecError::UnsupportedFormat(format.clone(), "no decoder for this format in this build")
                    }
                    other => CodecError::Image(other),
                })?
            }
        };

        debug!(
            "Decoded {} image {}x{}",
            format,
            image.width(),
            image.height()
        );
        Ok((image, format))
    }

    fn encode(&self, image: &DynamicImage, options: &EncodeOptions) -> Result<Vec<u8>, CodecError> {
        match self.encoder {
            EncoderKind::Image => encode_with_image(image, options),
            EncoderKind::Mozjpeg => encode_with_mozjpeg(image, options),
        }
    }
}

fn is_heif(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
}

#[cfg(feature = "heif")]
fn decode_heif(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes)
        .map_err(|e| CodecError::Decode(format!("Failed to read HEIF: {}", e)))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| CodecError::Decode(format!("Failed to get primary image: {}", e)))?;

    let width = handle.width();
    let height = handle.height();
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| CodecError::Decode(format!("Failed to decode HEIF: {}", e)))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| CodecError::Decode("No RGB plane found".to_string()))?;

    // Rows may be padded beyond width * 3
    let row_len = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    image::RgbImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| CodecError::Decode("Failed to create RGB image".to_string()))
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    Err(CodecError::UnsupportedFormat(
        DetectedFormat::Heif,
        "built without the `heif` feature",
    ))
}

fn encode_with_image(image: &DynamicImage, options: &EncodeOptions) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, options.quality.max(1));
        match image.color() {
            ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
                let luma = image.to_luma8();
                encoder.encode(luma.as_raw(), luma.width(), luma.height(), ColorType::L8)?;
            }
            _ => {
                let rgb = image.to_rgb8();
                encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
            }
        }
    }
    Ok(buffer)
}

#[cfg(feature = "mozjpeg")]
fn encode_with_mozjpeg(image: &DynamicImage, options: &EncodeOptions) -> Result<Vec<u8>, CodecError> {
    use mozjpeg::{ColorSpace, Compress};

    let rgb = image.to_rgb8();
    let sampling = match options.subsampling {
        ChromaSubsampling::Full444 => (1, 1),
        ChromaSubsampling::Half422 => (2, 1),
        ChromaSubsampling::Quarter420 => (2, 2),
    };

    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(rgb.width() as usize, rgb.height() as usize);
    comp.set_quality(options.quality.max(1) as f32);
    comp.set_optimize_coding(options.optimize);
    comp.set_chroma_sampling_pixel_sizes(sampling, sampling);

    let mut started = comp
        .start_compress(Vec::new())
        .map_err(|e| CodecError::Encode(format!("mozjpeg start failed: {}", e)))?;
    started
        .write_scanlines(rgb.as_raw())
        .map_err(|e| CodecError::Encode(format!("mozjpeg scanlines failed: {}", e)))?;
    started
        .finish()
        .map_err(|e| CodecError::Encode(format!("mozjpeg finish failed: {}", e)))
}

#[cfg(not(feature = "mozjpeg"))]
fn encode_with_mozjpeg(image: &DynamicImage, options: &EncodeOptions) -> Result<Vec<u8>, CodecError> {
    encode_with_image(image, options)
}

/// Result of a successful transcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSuccess {
    pub original_size: u64,
    pub bytes_written: u64,
    pub detected_format: DetectedFormat,
}

/// A failed transcode, with the source format when decoding got that far
#[derive(Debug)]
pub struct TranscodeFailure {
    pub detected_format: Option<DetectedFormat>,
    pub error: CodecError,
}

impl From<CodecError> for TranscodeFailure {
    fn from(error: CodecError) -> Self {
        Self {
            detected_format: None,
            error,
        }
    }
}

/// # Image Processor
///
/// Runs one [`TranscodeTask`] through an [`ImageCodec`]: read the source,
/// decode it, re-encode it and write the destination atomically.
///
/// The codec work and its blocking file I/O run on tokio's blocking pool; the
/// caller awaits each transcode before starting the next one.
///
/// ## Errors
/// - `CodecError::Unrecognized` / `UnsupportedFormat`: the content is not an
///   image this build can read
/// - any other `CodecError`: I/O, decode or encode failure
pub struct ImageProcessor {
    codec: Arc<dyn ImageCodec>,
}

impl ImageProcessor {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Transcode `task.source` into `task.destination`.
    ///
    /// The destination's parent directory must already exist.
    pub async fn transcode(&self, task: &TranscodeTask) -> Result<TranscodeSuccess, TranscodeFailure> {
        let codec = Arc::clone(&self.codec);
        let task = task.clone();

        tokio::task::spawn_blocking(move || Self::transcode_blocking(codec.as_ref(), &task))
            .await
            .map_err(|e| TranscodeFailure::from(CodecError::Task(e.to_string())))?
    }

    /// Synchronous body of [`transcode`](Self::transcode).
    pub fn transcode_blocking(
        codec: &dyn ImageCodec,
        task: &TranscodeTask,
    ) -> Result<TranscodeSuccess, TranscodeFailure> {
        let bytes = std::fs::read(&task.source).map_err(CodecError::from)?;
        let original_size = bytes.len() as u64;

        let (image, detected_format) = catch_codec_panic(|| codec.decode(&bytes))?;
        drop(bytes);

        let encoded = catch_codec_panic(|| codec.encode(&image, &task.options))
            .map_err(|error| TranscodeFailure {
                detected_format: Some(detected_format.clone()),
                error,
            })?;

        write_atomically(&task.destination, &encoded).map_err(|error| TranscodeFailure {
            detected_format: Some(detected_format.clone()),
            error,
        })?;

        Ok(TranscodeSuccess {
            original_size,
            bytes_written: encoded.len() as u64,
            detected_format,
        })
    }
}

/// Run a codec call, turning a panic inside the codec into a `CodecError`
fn catch_codec_panic<T>(call: impl FnOnce() -> Result<T, CodecError>) -> Result<T, CodecError> {
    std::panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(CodecError::Task(format!("codec panicked: {}", message)))
    })
}

/// Write `data` to a temp file next to `destination`, then rename it into place
fn write_atomically(destination: &Path, data: &[u8]) -> Result<(), CodecError> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(destination).map_err(|e| CodecError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Noisy gradient so JPEG quality has a visible effect on size
    pub(crate) fn sample_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let noise = ((x * 7919 + y * 104729) % 97) as u8;
            Rgb([
                (x * 255 / width.max(1)) as u8 ^ noise,
                (y * 255 / height.max(1)) as u8,
                noise.wrapping_mul(3),
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    pub(crate) fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
        let options = Config::compression(quality).encode_options();
        encode_with_image(&sample_image(width, height), &options).unwrap()
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        sample_image(width, height)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn task(source: PathBuf, destination: PathBuf, config: &Config) -> TranscodeTask {
        TranscodeTask {
            source,
            destination,
            options: config.encode_options(),
        }
    }

    #[test]
    fn test_detects_format_from_content() {
        assert_eq!(RustCodec::detect_format(&jpeg_bytes(8, 8, 90)), Some(DetectedFormat::Jpeg));
        assert_eq!(RustCodec::detect_format(&png_bytes(8, 8)), Some(DetectedFormat::Png));
        assert_eq!(RustCodec::detect_format(b"just some text, not pixels"), None);

        let mut heic = vec![0, 0, 0, 24];
        heic.extend_from_slice(b"ftypheic");
        heic.extend_from_slice(&[0; 12]);
        assert_eq!(RustCodec::detect_format(&heic), Some(DetectedFormat::Heif));
    }

    #[test]
    fn test_decode_rejects_non_image() {
        let codec = RustCodec::default();
        let err = codec.decode(b"plain text masquerading as a photo").unwrap_err();
        assert!(matches!(err, CodecError::Unrecognized));
        assert!(err.is_unreadable());
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_heif_without_feature_is_unreadable() {
        let mut heic = vec![0, 0, 0, 24];
        heic.extend_from_slice(b"ftypmif1");
        heic.extend_from_slice(&[0; 12]);

        let err = RustCodec::default().decode(&heic).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedFormat(DetectedFormat::Heif, _)));
        assert!(err.is_unreadable());
    }

    #[cfg(feature = "heif")]
    fn heic_bytes(width: u32, height: u32) -> Vec<u8> {
        use libheif_rs::{
            Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif, RgbChroma,
        };

        let source = sample_image(width, height).to_rgb8();
        let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
        image.create_plane(Channel::Interleaved, width, height, 8).unwrap();
        {
            let planes = image.planes_mut();
            let plane = planes.interleaved.unwrap();
            let row_len = width as usize * 3;
            for (y, row) in source.as_raw().chunks(row_len).enumerate() {
                let start = y * plane.stride;
                plane.data[start..start + row_len].copy_from_slice(row);
            }
        }

        let lib_heif = LibHeif::new();
        let mut context = HeifContext::new().unwrap();
        let mut encoder = lib_heif.encoder_for_format(CompressionFormat::Hevc).unwrap();
        encoder.set_quality(EncoderQuality::Lossy(90)).unwrap();
        context.encode_image(&image, &mut encoder, None).unwrap();
        context.write_to_bytes().unwrap()
    }

    #[cfg(feature = "heif")]
    #[test]
    fn test_heic_with_jpg_name_becomes_jpeg() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("photo.jpg");
        let destination = temp.path().join("out.jpg");
        let heic = heic_bytes(64, 48);
        assert_eq!(RustCodec::detect_format(&heic), Some(DetectedFormat::Heif));
        std::fs::write(&source, heic).unwrap();

        let codec = RustCodec::default();
        let result = ImageProcessor::transcode_blocking(
            &codec,
            &task(source, destination.clone(), &Config::full_fidelity()),
        )
        .unwrap();

        assert_eq!(result.detected_format, DetectedFormat::Heif);
        let written = std::fs::read(&destination).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_truncated_jpeg_is_not_unreadable() {
        let mut bytes = jpeg_bytes(32, 32, 90);
        bytes.truncate(40);
        let err = RustCodec::default().decode(&bytes).unwrap_err();
        assert!(!err.is_unreadable());
    }

    #[test]
    fn test_png_with_jpg_name_becomes_jpeg() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("mislabeled.jpg");
        let destination = temp.path().join("out.jpg");
        std::fs::write(&source, png_bytes(16, 12)).unwrap();

        let codec = RustCodec::default();
        let result = ImageProcessor::transcode_blocking(
            &codec,
            &task(source, destination.clone(), &Config::full_fidelity()),
        )
        .unwrap();

        assert_eq!(result.detected_format, DetectedFormat::Png);
        let written = std::fs::read(&destination).unwrap();
        assert_eq!(result.bytes_written, written.len() as u64);
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[test]
    fn test_failed_transcode_leaves_no_output() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.jpg");
        std::fs::write(&source, b"not an image").unwrap();

        let failure = ImageProcessor::transcode_blocking(
            &RustCodec::default(),
            &task(source, temp.path().join("out.jpg"), &Config::full_fidelity()),
        )
        .unwrap_err();

        assert!(failure.error.is_unreadable());
        assert_eq!(failure.detected_format, None);
        let remaining: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_lower_quality_is_not_larger() {
        let image = sample_image(128, 96);
        let codec = RustCodec::default();
        let low = codec.encode(&image, &Config::compression(50).encode_options()).unwrap();
        let high = codec.encode(&image, &Config::compression(95).encode_options()).unwrap();
        assert!(low.len() <= high.len(), "q50 {} bytes > q95 {} bytes", low.len(), high.len());
    }

    #[test]
    fn test_quality_zero_is_accepted() {
        let codec = RustCodec::default();
        let encoded = codec
            .encode(&sample_image(8, 8), &Config::compression(0).encode_options())
            .unwrap();
        assert_eq!(image::guess_format(&encoded).unwrap(), ImageFormat::Jpeg);
    }

    #[cfg(not(feature = "mozjpeg"))]
    #[test]
    fn test_mozjpeg_falls_back_without_feature() {
        assert_eq!(RustCodec::new(EncoderKind::Mozjpeg).encoder(), EncoderKind::Image);
    }

    #[tokio::test]
    async fn test_async_transcode() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.JPG");
        let destination = temp.path().join("out.JPG");
        std::fs::write(&source, jpeg_bytes(20, 20, 95)).unwrap();

        let processor = ImageProcessor::new(Arc::new(RustCodec::default()));
        let result = processor
            .transcode(&task(source, destination.clone(), &Config::compression(60)))
            .await
            .unwrap();

        assert_eq!(result.detected_format, DetectedFormat::Jpeg);
        assert!(destination.exists());
    }

    #[test]
    fn test_codec_panic_becomes_error() {
        let result: Result<(), CodecError> = catch_codec_panic(|| panic!("encoder exploded"));
        match result {
            Err(CodecError::Task(message)) => assert!(message.contains("encoder exploded")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(catch_codec_panic(|| Ok::<_, CodecError>(7)).is_ok());
    }
}
