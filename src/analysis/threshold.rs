//! Quality tiers and their thresholds.
//!
//! A sample is GOOD when it clears the good band, MID when it clears the
//! looser mid band, and BAD otherwise. Brightness bounds are exclusive on
//! both sides.

use super::scorer::QualitySample;
use crate::capture::ConfigError;
use serde::{Deserialize, Serialize};

/// Discrete quality classification of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Good,
    Mid,
    Bad,
}

impl QualityTier {
    /// Short label used as the visual class of the status surface.
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Good => "good",
            QualityTier::Mid => "mid",
            QualityTier::Bad => "bad",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Requirements a sample must meet to reach one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    /// Sharpness must be strictly greater than this.
    pub min_sharpness: f64,
    /// Brightness must be strictly greater than this.
    pub min_brightness: f64,
    /// Brightness must be strictly less than this.
    pub max_brightness: f64,
}

impl TierBand {
    /// Checks a sample against the band.
    pub fn check(&self, sample: &QualitySample) -> Result<(), ThresholdViolation> {
        if sample.sharpness <= self.min_sharpness {
            return Err(ThresholdViolation::LowSharpness {
                observed: sample.sharpness,
                threshold: self.min_sharpness,
            });
        }

        if sample.brightness <= self.min_brightness {
            return Err(ThresholdViolation::TooDark {
                observed: sample.brightness,
                threshold: self.min_brightness,
            });
        }

        if sample.brightness >= self.max_brightness {
            return Err(ThresholdViolation::TooBright {
                observed: sample.brightness,
                threshold: self.max_brightness,
            });
        }

        Ok(())
    }

    fn contains(&self, other: &TierBand) -> bool {
        self.min_sharpness <= other.min_sharpness
            && self.min_brightness <= other.min_brightness
            && self.max_brightness >= other.max_brightness
    }
}

/// Quality thresholds for frame classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub good: TierBand,
    pub mid: TierBand,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            good: TierBand {
                min_sharpness: 35.0,
                min_brightness: 35.0,
                max_brightness: 230.0,
            },
            mid: TierBand {
                min_sharpness: 20.0,
                min_brightness: 25.0,
                max_brightness: 245.0,
            },
        }
    }
}

impl QualityThresholds {
    /// Creates more permissive thresholds, for dim rooms and soft lenses.
    pub fn permissive() -> Self {
        Self {
            good: TierBand {
                min_sharpness: 25.0,
                min_brightness: 25.0,
                max_brightness: 250.0,
            },
            mid: TierBand {
                min_sharpness: 15.0,
                min_brightness: 20.0,
                max_brightness: 255.0,
            },
        }
    }

    /// Classifies a sample into a tier.
    pub fn classify(&self, sample: &QualitySample) -> QualityTier {
        if self.good.check(sample).is_ok() {
            QualityTier::Good
        } else if self.mid.check(sample).is_ok() {
            QualityTier::Mid
        } else {
            QualityTier::Bad
        }
    }

    /// Returns the reason a sample misses the good band, if it does.
    pub fn explain(&self, sample: &QualitySample) -> Option<ThresholdViolation> {
        self.good.check(sample).err()
    }

    /// Validates that the good band is at least as strict as the mid band.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, band) in [("thresholds.good", &self.good), ("thresholds.mid", &self.mid)] {
            if band.min_brightness >= band.max_brightness {
                return Err(ConfigError::InvalidValue {
                    field: name,
                    reason: "brightness band is empty".into(),
                });
            }
        }
        if !self.mid.contains(&self.good) {
            return Err(ConfigError::InvalidValue {
                field: "thresholds",
                reason: "good band must lie within the mid band".into(),
            });
        }
        Ok(())
    }
}

/// Threshold violation types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ThresholdViolation {
    #[error("sharpness {observed:.2} not above {threshold:.2}")]
    LowSharpness { observed: f64, threshold: f64 },

    #[error("brightness {observed:.2} not above {threshold:.2}")]
    TooDark { observed: f64, threshold: f64 },

    #[error("brightness {observed:.2} not below {threshold:.2}")]
    TooBright { observed: f64, threshold: f64 },
}
