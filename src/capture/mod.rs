//! Live source input and frame handling.
//!
//! This module provides the abstractions the capture core needs from the
//! outside world: a live source that can render regions of its current
//! frame, a sampler over it, optional orientation input, and the frame type
//! delivered to consumers.

mod config;
mod frame;
#[cfg(feature = "camera")]
mod nokhwa_source;
mod orientation;
mod sampler;
mod source;
mod synthetic;

pub use config::{CaptureConfig, ConfigError, FacingMode, FileConfig};
pub use frame::CaptureFrame;
#[cfg(feature = "camera")]
pub use nokhwa_source::NokhwaSource;
pub use orientation::{FixedOrientation, OrientationReading, OrientationSampler};
pub use sampler::{draw_region, sample_region, Region};
pub use source::{FrameSlot, LiveSource, SourceError, StillSource};
pub use synthetic::MockCamera;
