//! Greyscale conversion and contrast stretching.

use crate::analysis::luma;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Options for the preprocessing pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Run a 3x3 smoothing pass after stretching, to soften specular glints.
    pub smoothing: bool,
}

/// Converts to greyscale and stretches the used range to [0, 255].
///
/// Luma is truncated to an integer grey level. The three color channels
/// receive the same value; alpha is untouched. A flat frame (no dynamic
/// range) keeps its grey level.
pub fn stretch_contrast(image: &mut RgbaImage) {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let grey: Vec<u8> = image
        .pixels()
        .map(|p| {
            let g = luma(p[0], p[1], p[2]) as u8;
            min = min.min(g);
            max = max.max(g);
            g
        })
        .collect();

    if grey.is_empty() {
        return;
    }

    let (low, range) = if max > min {
        (min as u32, (max - min) as u32)
    } else {
        (0, 255)
    };

    for (pixel, &g) in image.pixels_mut().zip(grey.iter()) {
        let v = ((g as u32 - low) * 255 / range) as u8;
        pixel[0] = v;
        pixel[1] = v;
        pixel[2] = v;
    }
}

/// Applies a 3x3 binomial blur to interior pixels; the one-pixel border is
/// left as is.
pub fn smooth(image: &mut RgbaImage) {
    const KERNEL: [[u32; 3]; 3] = [[1, 2, 1], [2, 4, 2], [1, 2, 1]];

    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return;
    }

    let source = image.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = [0u32; 3];
            for (ky, row) in KERNEL.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    let p = source.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for c in 0..3 {
                        acc[c] += p[c] as u32 * weight;
                    }
                }
            }
            let out = image.get_pixel_mut(x, y);
            for c in 0..3 {
                out[c] = ((acc[c] + 8) / 16) as u8;
            }
        }
    }
}

/// Runs the configured preprocessing passes in place.
pub fn preprocess(image: &mut RgbaImage, config: &PreprocessConfig) {
    stretch_contrast(image);
    if config.smoothing {
        smooth(image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    fn grey_image(values: &[u8], width: u32) -> RgbaImage {
        let height = values.len() as u32 / width;
        RgbaImage::from_fn(width, height, |x, y| {
            let v = values[(y * width + x) as usize];
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn test_stretch_maps_range_to_full_scale() {
        let mut image = grey_image(&[100, 150, 200, 125], 2);
        stretch_contrast(&mut image);

        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(image.get_pixel(0, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(1, 0)[0], 127);
    }

    #[test]
    fn test_flat_frame_unchanged() {
        let mut image = grey_image(&[77; 9], 3);
        let before = image.clone();
        stretch_contrast(&mut image);
        assert_eq!(image, before);
    }

    #[test]
    fn test_color_becomes_monochrome() {
        let mut image = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 128])
            } else {
                Rgba([0, 0, 255, 128])
            }
        });
        stretch_contrast(&mut image);

        for p in image.pixels() {
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
            assert_eq!(p[3], 128);
        }
    }

    #[test]
    fn test_grey_level_truncates() {
        // Pure green has luma 149.685.
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
        stretch_contrast(&mut image);
        assert!(image.pixels().all(|p| p == &Rgba([149, 149, 149, 255])));

        // Grey 128 lands just below 128 in floating point.
        let mut image = grey_image(&[128, 128, 0, 255], 2);
        stretch_contrast(&mut image);
        assert_eq!(image.get_pixel(0, 0)[0], 127);
    }

    #[test]
    fn test_smooth_leaves_border() {
        let mut image = grey_image(&[0, 0, 0, 0, 160, 0, 0, 0, 0], 3);
        smooth(&mut image);

        assert_eq!(image.get_pixel(1, 1)[0], 40);
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(2, 1)[0], 0);
    }

    #[test]
    fn test_smooth_skips_tiny_frames() {
        let mut image = grey_image(&[0, 255, 0, 255], 2);
        let before = image.clone();
        smooth(&mut image);
        assert_eq!(image, before);
    }

    proptest! {
        #[test]
        fn prop_stretch_spans_full_range(values in proptest::collection::vec(any::<u8>(), 2..64)) {
            let mut image = grey_image(&values, values.len() as u32);
            stretch_contrast(&mut image);

            let grey: Vec<u8> = values.iter().map(|&v| luma(v, v, v) as u8).collect();
            let min = image.pixels().map(|p| p[0]).min().unwrap();
            let max = image.pixels().map(|p| p[0]).max().unwrap();
            if grey.iter().all(|&g| g == grey[0]) {
                prop_assert_eq!(min, max);
                prop_assert_eq!(min, grey[0]);
            } else {
                prop_assert_eq!(min, 0);
                prop_assert_eq!(max, 255);
            }
        }
    }
}
