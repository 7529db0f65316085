//! Frame quality metrics.
//!
//! Both metrics run on small fixed-size renderings of the live frame, so a
//! tick costs the same on every device. Sharpness is the population
//! variance of luma: blur lowers local contrast and with it the variance.
//! Brightness is the mean luma.

use crate::capture::{sample_region, ConfigError, LiveSource, SourceError};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Divisor keeping sharpness thresholds in a human-tunable integer range.
const SHARPNESS_SCALE: f64 = 100.0;

/// ITU-R BT.601 luma of an RGB triple.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Variance of luma over all pixels, divided by 100.
///
/// Returns 0.0 for an empty buffer.
pub fn sharpness(sample: &RgbaImage) -> f64 {
    let count = sample.width() as usize * sample.height() as usize;
    if count == 0 {
        return 0.0;
    }

    let n = count as f64;
    let mean = sample.pixels().map(|p| luma(p[0], p[1], p[2])).sum::<f64>() / n;
    let variance = sample
        .pixels()
        .map(|p| (luma(p[0], p[1], p[2]) - mean).powi(2))
        .sum::<f64>()
        / n;

    variance / SHARPNESS_SCALE
}

/// Mean luma over all pixels, in [0, 255].
///
/// Returns 0.0 for an empty buffer.
pub fn brightness(sample: &RgbaImage) -> f64 {
    let count = sample.width() as usize * sample.height() as usize;
    if count == 0 {
        return 0.0;
    }
    sample.pixels().map(|p| luma(p[0], p[1], p[2])).sum::<f64>() / count as f64
}

/// One tick's quality measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySample {
    /// Luma variance / 100.
    pub sharpness: f64,
    /// Mean luma.
    pub brightness: f64,
}

impl QualitySample {
    /// Measures sharpness and brightness from their analysis renderings.
    pub fn measure(sharpness_sample: &RgbaImage, brightness_sample: &RgbaImage) -> Self {
        Self {
            sharpness: sharpness(sharpness_sample),
            brightness: brightness(brightness_sample),
        }
    }
}

/// Analysis resolutions for the quality metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sharpness_width: u32,
    pub sharpness_height: u32,
    pub brightness_width: u32,
    pub brightness_height: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sharpness_width: 160,
            sharpness_height: 120,
            brightness_width: 64,
            brightness_height: 48,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sharpness_width == 0
            || self.sharpness_height == 0
            || self.brightness_width == 0
            || self.brightness_height == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "analysis",
                reason: "analysis resolutions must be non-zero".into(),
            });
        }
        Ok(())
    }
}

/// Samples a live source and scores it.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: AnalysisConfig,
}

impl QualityScorer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Scores the source's current frame.
    ///
    /// Returns `Ok(None)` while the source has no frame yet.
    pub fn score<S: LiveSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Option<QualitySample>, SourceError> {
        let Some(sharp) = sample_region(
            source,
            None,
            self.config.sharpness_width,
            self.config.sharpness_height,
        )?
        else {
            return Ok(None);
        };
        let Some(bright) = sample_region(
            source,
            None,
            self.config.brightness_width,
            self.config.brightness_height,
        )?
        else {
            return Ok(None);
        };

        Ok(Some(QualitySample::measure(&sharp, &bright)))
    }
}
