//! Capture and pipeline configuration.
//!
//! Every tunable of the capture loop lives in a serde section with a
//! `Default` matching the stock behavior, so a config file only needs to
//! name the values it changes.

use crate::analysis::{AnalysisConfig, QualityThresholds};
use crate::camera::MonitorConfig;
use crate::consensus::ConsensusConfig;
use crate::processing::{EncoderConfig, HashConfig, NormalizeConfig, PreprocessConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed at the document.
    #[default]
    Environment,
    /// Front camera.
    User,
}

/// Requested stream format passed to [`LiveSource::open`](super::LiveSource::open).
///
/// These are ideals: a source may deliver a different resolution, which is
/// why every later stage works from the natural size it reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index or identifier.
    pub device_id: u32,
    /// Ideal frame width in pixels.
    pub width: u32,
    /// Ideal frame height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Preferred camera facing.
    pub facing: FacingMode,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 1280,
            height: 720,
            fps: 30,
            facing: FacingMode::Environment,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub thresholds: QualityThresholds,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub hash: HashConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.monitor.validate()?;
        self.thresholds.validate()?;
        self.analysis.validate()?;
        self.normalize.validate()?;
        self.hash.validate()?;
        self.consensus.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}
