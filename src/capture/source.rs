//! Live source abstraction for frame acquisition.
//!
//! The capture core never talks to camera hardware directly. It asks a
//! [`LiveSource`] for the natural size of the current frame and for
//! renderings of sub-rectangles of it, which keeps every analysis step
//! independent of the device resolution.

use super::sampler::{draw_region, Region};
use super::CaptureConfig;
use image::RgbaImage;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to read frame: {0}")]
    FrameFailed(String),
    #[error("torch not supported by this source")]
    TorchUnsupported,
    #[error("failed to switch torch: {0}")]
    TorchFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for live video sources.
///
/// Implementations report `(0, 0)` from [`natural_size`](LiveSource::natural_size)
/// until they hold a decodable frame.
pub trait LiveSource {
    /// Opens the source with the requested stream format.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError>;

    /// Checks if the source is currently open.
    fn is_open(&self) -> bool;

    /// Closes the source and releases its resources.
    fn close(&mut self);

    /// Pulls the newest frame, if the source needs to be polled.
    fn refresh(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Natural width and height of the current frame.
    fn natural_size(&self) -> (u32, u32);

    /// Renders `region` of the current frame into a `width` x `height` buffer.
    fn render(&self, region: Region, width: u32, height: u32) -> Result<RgbaImage, SourceError>;

    /// Whether the source exposes a controllable light.
    fn torch_supported(&self) -> bool {
        false
    }

    /// Switches the light on or off.
    fn set_torch(&mut self, _enabled: bool) -> Result<(), SourceError> {
        Err(SourceError::TorchUnsupported)
    }
}

/// Shared slot holding the frame a [`StillSource`] serves.
pub type FrameSlot = Arc<Mutex<Option<RgbaImage>>>;

/// Source serving whatever frame was last pushed into its slot.
///
/// Useful for feeding frames decoded elsewhere and for tests.
#[derive(Debug, Default)]
pub struct StillSource {
    slot: FrameSlot,
    open: bool,
    unavailable: bool,
    torch_supported: bool,
    torch_on: bool,
}

impl StillSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source already holding `frame`.
    pub fn with_frame(frame: RgbaImage) -> Self {
        let source = Self::default();
        source.set_frame(frame);
        source
    }

    /// Creates a source whose `open` always fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Enables the simulated torch.
    pub fn with_torch(mut self) -> Self {
        self.torch_supported = true;
        self
    }

    /// Returns a handle that can push frames from elsewhere.
    pub fn slot(&self) -> FrameSlot {
        Arc::clone(&self.slot)
    }

    /// Replaces the current frame.
    pub fn set_frame(&self, frame: RgbaImage) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame);
        }
    }

    /// Drops the current frame, making the source report zero size.
    pub fn clear_frame(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    /// Returns whether the simulated torch is lit.
    pub fn torch_on(&self) -> bool {
        self.torch_on
    }
}

impl LiveSource for StillSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError> {
        if self.unavailable {
            return Err(SourceError::DeviceNotFound(format!(
                "device {}",
                config.device_id
            )));
        }
        config
            .validate()
            .map_err(|e| SourceError::ConfigFailed(e.to_string()))?;
        self.open = true;
        tracing::info!("StillSource opened");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        self.torch_on = false;
        tracing::info!("StillSource closed");
    }

    fn natural_size(&self) -> (u32, u32) {
        match self.slot.lock() {
            Ok(slot) => slot.as_ref().map(|f| f.dimensions()).unwrap_or((0, 0)),
            Err(_) => (0, 0),
        }
    }

    fn render(&self, region: Region, width: u32, height: u32) -> Result<RgbaImage, SourceError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| SourceError::FrameFailed("frame slot poisoned".into()))?;
        let frame = slot.as_ref().ok_or(SourceError::NotInitialized)?;
        Ok(draw_region(frame, region, width, height))
    }

    fn torch_supported(&self) -> bool {
        self.torch_supported
    }

    fn set_torch(&mut self, enabled: bool) -> Result<(), SourceError> {
        if !self.torch_supported {
            return Err(SourceError::TorchUnsupported);
        }
        self.torch_on = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_still_source_lifecycle() {
        let mut source = StillSource::new();
        let config = CaptureConfig::default();

        assert!(!source.is_open());
        assert_eq!(source.natural_size(), (0, 0));

        source.open(&config).unwrap();
        assert!(source.is_open());

        source.set_frame(RgbaImage::from_pixel(40, 30, Rgba([10, 20, 30, 255])));
        assert_eq!(source.natural_size(), (40, 30));

        let out = source.render(Region::full(40, 30), 8, 6).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.get_pixel(3, 3), &Rgba([10, 20, 30, 255]));

        source.close();
        assert!(!source.is_open());
    }

    #[test]
    fn test_render_without_frame() {
        let source = StillSource::new();
        assert!(matches!(
            source.render(Region::full(4, 4), 4, 4),
            Err(SourceError::NotInitialized)
        ));
    }

    #[test]
    fn test_unavailable_source_fails_open() {
        let mut source = StillSource::unavailable();
        assert!(matches!(
            source.open(&CaptureConfig::default()),
            Err(SourceError::DeviceNotFound(_))
        ));
        assert!(!source.is_open());
    }

    #[test]
    fn test_torch_requires_support() {
        let mut plain = StillSource::new();
        assert!(matches!(
            plain.set_torch(true),
            Err(SourceError::TorchUnsupported)
        ));

        let mut lit = StillSource::new().with_torch();
        lit.set_torch(true).unwrap();
        assert!(lit.torch_on());
    }

    #[test]
    fn test_slot_pushes_frames() {
        let source = StillSource::new();
        let slot = source.slot();
        *slot.lock().unwrap() = Some(RgbaImage::new(16, 9));
        assert_eq!(source.natural_size(), (16, 9));

        source.clear_frame();
        assert_eq!(source.natural_size(), (0, 0));
    }
}
