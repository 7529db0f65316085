//! Pixel sampling from a live source.
//!
//! Sampling is a pure function of (source, region, size): the source draws
//! the requested region into an offscreen buffer of the requested size and
//! the raw RGBA samples come back as an [`RgbaImage`].

use super::source::{LiveSource, SourceError};
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Axis-aligned rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering a whole `width` x `height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clips the region to a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

/// Draws `region` of `image` scaled into a new `width` x `height` buffer.
///
/// An empty (or fully out of bounds) region yields a transparent buffer.
pub fn draw_region(image: &RgbaImage, region: Region, width: u32, height: u32) -> RgbaImage {
    let region = region.clamp_to(image.width(), image.height());
    if region.is_empty() || width == 0 || height == 0 {
        return RgbaImage::new(width, height);
    }

    let view = imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
    if view.dimensions() == (width, height) {
        return view;
    }
    imageops::resize(&view, width, height, FilterType::Triangle)
}

/// Samples `region` (the whole frame when `None`) at `width` x `height`.
///
/// Returns `Ok(None)` while the source has no decodable frame yet.
pub fn sample_region<S: LiveSource + ?Sized>(
    source: &S,
    region: Option<Region>,
    width: u32,
    height: u32,
) -> Result<Option<RgbaImage>, SourceError> {
    let (natural_width, natural_height) = source.natural_size();
    if natural_width == 0 || natural_height == 0 || width == 0 || height == 0 {
        return Ok(None);
    }

    let region = region.unwrap_or_else(|| Region::full(natural_width, natural_height));
    source.render(region, width, height).map(Some)
}
