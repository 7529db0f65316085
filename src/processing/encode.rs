//! Compressed blob encoding of captured frames.

use crate::capture::ConfigError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

/// Errors that can occur while encoding a frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("encoder quality {0} is outside (0, 1]")]
    InvalidQuality(f32),
}

/// Container format of an encoded capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobFormat {
    #[default]
    Jpeg,
    Png,
}

impl BlobFormat {
    /// MIME type of the format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            BlobFormat::Jpeg => "image/jpeg",
            BlobFormat::Png => "image/png",
        }
    }
}

/// Encoder format and quality factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub format: BlobFormat,
    /// Lossy quality factor in (0, 1]; ignored for PNG.
    pub quality: f32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: BlobFormat::Jpeg,
            quality: 0.9,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "encoder.quality",
                reason: format!("{} is outside (0, 1]", self.quality),
            });
        }
        Ok(())
    }
}

/// Turns a pixel buffer into an opaque compressed blob.
pub trait BlobEncoder: Send {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, EncodeError>;

    fn format(&self) -> BlobFormat;
}

/// [`BlobEncoder`] backed by the `image` codecs.
#[derive(Debug, Clone)]
pub struct ImageBlobEncoder {
    format: BlobFormat,
    quality: f32,
}

impl ImageBlobEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self, EncodeError> {
        if !(config.quality > 0.0 && config.quality <= 1.0) {
            return Err(EncodeError::InvalidQuality(config.quality));
        }
        Ok(Self {
            format: config.format,
            quality: config.quality,
        })
    }

    fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for ImageBlobEncoder {
    fn default() -> Self {
        Self {
            format: BlobFormat::Jpeg,
            quality: 0.9,
        }
    }
}

impl BlobEncoder for ImageBlobEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        match self.format {
            BlobFormat::Jpeg => {
                // JPEG has no alpha channel.
                let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
                JpegEncoder::new_with_quality(&mut out, self.jpeg_quality()).encode_image(&rgb)?;
            }
            BlobFormat::Png => {
                image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
            }
        }

        tracing::trace!(
            format = ?self.format,
            bytes = out.len(),
            width = image.width(),
            height = image.height(),
            "Encoded frame"
        );
        Ok(out)
    }

    fn format(&self) -> BlobFormat {
        self.format
    }
}
