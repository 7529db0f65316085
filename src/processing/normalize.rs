//! Canonical frame geometry.
//!
//! Every capture leaves the normalizer as a landscape buffer of one fixed
//! resolution, whatever the device delivered. Portrait frames are turned a
//! quarter turn about their center, the result is cover-cropped to the target
//! aspect ratio, and the crop is scaled to the output size.

use crate::capture::{draw_region, ConfigError, LiveSource, Region, SourceError};
use image::imageops;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Output geometry of normalized frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub output_width: u32,
    pub output_height: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            output_width: 1600,
            output_height: 900,
        }
    }
}

impl NormalizeConfig {
    /// Target aspect ratio (width / height).
    #[inline]
    pub fn aspect(&self) -> f64 {
        self.output_width as f64 / self.output_height as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "normalize",
                reason: "output resolution must be non-zero".into(),
            });
        }
        if self.output_height > self.output_width {
            return Err(ConfigError::InvalidValue {
                field: "normalize",
                reason: "output must be landscape".into(),
            });
        }
        Ok(())
    }
}

/// Centered crop of a `width` x `height` frame filling `aspect` exactly.
///
/// Wider frames lose equal strips left and right, taller frames lose equal
/// strips top and bottom.
pub fn cover_crop(width: u32, height: u32, aspect: f64) -> Region {
    if width == 0 || height == 0 {
        return Region::full(width, height);
    }

    let source_aspect = width as f64 / height as f64;
    if source_aspect > aspect {
        let crop_width = ((height as f64 * aspect).round() as u32).clamp(1, width);
        Region::new((width - crop_width) / 2, 0, crop_width, height)
    } else {
        let crop_height = ((width as f64 / aspect).round() as u32).clamp(1, height);
        Region::new(0, (height - crop_height) / 2, width, crop_height)
    }
}

/// Produces canonical landscape frames from a live source.
#[derive(Debug, Clone, Default)]
pub struct FrameNormalizer {
    config: NormalizeConfig,
}

impl FrameNormalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Normalizes the source's current frame.
    ///
    /// Returns `Ok(None)` while the source reports a zero dimension.
    pub fn normalize<S: LiveSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Option<RgbaImage>, SourceError> {
        let (width, height) = source.natural_size();
        if width == 0 || height == 0 {
            return Ok(None);
        }

        if height > width {
            let full = source.render(Region::full(width, height), width, height)?;
            return Ok(self.normalize_image(&full));
        }

        // Landscape sources can render the crop straight at output size.
        let crop = cover_crop(width, height, self.config.aspect());
        source
            .render(crop, self.config.output_width, self.config.output_height)
            .map(Some)
    }

    /// Normalizes an already decoded frame.
    pub fn normalize_image(&self, frame: &RgbaImage) -> Option<RgbaImage> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let rotated;
        let landscape = if height > width {
            rotated = imageops::rotate90(frame);
            &rotated
        } else {
            frame
        };

        let crop = cover_crop(
            landscape.width(),
            landscape.height(),
            self.config.aspect(),
        );
        Some(draw_region(
            landscape,
            crop,
            self.config.output_width,
            self.config.output_height,
        ))
    }
}
