//! Native camera source backed by `nokhwa`.

use super::sampler::{draw_region, Region};
use super::source::{LiveSource, SourceError};
use super::CaptureConfig;
use image::RgbaImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

/// Live source reading frames from a native camera.
///
/// Torch control is not exposed by the native backends, so the light
/// capability reports unsupported.
#[derive(Default)]
pub struct NokhwaSource {
    camera: Option<Camera>,
    latest: Option<RgbaImage>,
}

impl NokhwaSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LiveSource for NokhwaSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError> {
        config
            .validate()
            .map_err(|e| SourceError::ConfigFailed(e.to_string()))?;

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::MJPEG,
                config.fps,
            ),
        ));
        let mut camera = Camera::new(CameraIndex::Index(config.device_id), format)
            .map_err(|e| SourceError::DeviceNotFound(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| SourceError::OpenFailed(e.to_string()))?;

        tracing::info!(
            device = config.device_id,
            facing = ?config.facing,
            "Native camera stream opened"
        );
        self.camera = Some(camera);
        self.latest = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.camera.is_some()
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Failed to stop camera stream: {}", e);
            }
        }
        self.latest = None;
        tracing::info!("Native camera closed");
    }

    fn refresh(&mut self) -> Result<(), SourceError> {
        let camera = self.camera.as_mut().ok_or(SourceError::NotInitialized)?;
        let buffer = camera
            .frame()
            .map_err(|e| SourceError::FrameFailed(e.to_string()))?;
        let rgb = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| SourceError::FrameFailed(e.to_string()))?;

        let (width, height) = (rgb.width(), rgb.height());
        let rgba: Vec<u8> = rgb
            .into_raw()
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect();
        self.latest = RgbaImage::from_raw(width, height, rgba);
        Ok(())
    }

    fn natural_size(&self) -> (u32, u32) {
        self.latest
            .as_ref()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0))
    }

    fn render(&self, region: Region, width: u32, height: u32) -> Result<RgbaImage, SourceError> {
        let frame = self.latest.as_ref().ok_or(SourceError::NotInitialized)?;
        Ok(draw_region(frame, region, width, height))
    }
}
