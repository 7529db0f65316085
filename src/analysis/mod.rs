//! Frame quality scoring and classification.
//!
//! This module measures how usable the current live frame is (sharpness and
//! brightness), maps the measurement onto a discrete tier, and debounces the
//! tier into a steady ready signal.

mod debounce;
mod scorer;
mod threshold;

pub use debounce::Debouncer;
pub use scorer::{brightness, luma, sharpness, AnalysisConfig, QualitySample, QualityScorer};
pub use threshold::{QualityThresholds, QualityTier, ThresholdViolation, TierBand};
