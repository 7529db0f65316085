//! Synthetic document camera.
//!
//! Produces deterministic frames of a printed page: a run of washed-out,
//! unusable frames (simulating focus hunting and glare) followed by a run of
//! steady sharp frames, then a new page. Pages are generated from a seeded
//! ChaCha stream so demos and tests are reproducible.

use super::sampler::{draw_region, Region};
use super::source::{LiveSource, SourceError};
use super::CaptureConfig;
use image::{Rgba, RgbaImage};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};

const PAPER: u8 = 215;
const INK: u8 = 20;
const TORCH_BOOST: u8 = 25;

/// Mock camera generating synthetic document frames.
#[derive(Debug)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    rng: ChaCha8Rng,
    /// Unusable frames at the start of each page.
    unsteady_frames: u64,
    /// Sharp frames per page.
    steady_frames: u64,
    /// Deliver frames rotated to portrait.
    portrait: bool,
    page: Option<RgbaImage>,
    current: Option<RgbaImage>,
    sequence: u64,
    torch_on: bool,
}

impl MockCamera {
    pub fn new(seed: u64) -> Self {
        Self {
            config: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            unsteady_frames: 3,
            steady_frames: 6,
            portrait: false,
            page: None,
            current: None,
            sequence: 0,
            torch_on: false,
        }
    }

    /// Sets how many unusable and sharp frames each page spans.
    pub fn with_schedule(mut self, unsteady_frames: u64, steady_frames: u64) -> Self {
        self.unsteady_frames = unsteady_frames;
        self.steady_frames = steady_frames.max(1);
        self
    }

    /// Delivers frames taller than wide.
    pub fn with_portrait(mut self) -> Self {
        self.portrait = true;
        self
    }

    /// Number of frames produced so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn frame_size(&self, config: &CaptureConfig) -> (u32, u32) {
        if self.portrait {
            (config.height, config.width)
        } else {
            (config.width, config.height)
        }
    }

    fn next_frame(&mut self, width: u32, height: u32) -> RgbaImage {
        let cycle = self.unsteady_frames + self.steady_frames;
        let position = self.sequence % cycle;

        if position == 0 || self.page.is_none() {
            self.page = Some(render_page(&mut self.rng, width, height));
            tracing::debug!(sequence = self.sequence, "MockCamera turned to a new page");
        }

        let mut frame = match &self.page {
            Some(page) => page.clone(),
            None => RgbaImage::new(width, height),
        };
        if position < self.unsteady_frames {
            wash_out(&mut frame);
        }
        if self.torch_on {
            brighten(&mut frame, TORCH_BOOST);
        }
        frame
    }
}

impl LiveSource for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError> {
        config
            .validate()
            .map_err(|e| SourceError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        self.page = None;
        self.current = None;
        tracing::info!("MockCamera opened with config: {:?}", config);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        self.current = None;
        self.torch_on = false;
        tracing::info!("MockCamera closed");
    }

    fn refresh(&mut self) -> Result<(), SourceError> {
        let config = self.config.as_ref().ok_or(SourceError::NotInitialized)?;
        let (width, height) = self.frame_size(config);

        let frame = self.next_frame(width, height);
        self.current = Some(frame);
        self.sequence += 1;
        Ok(())
    }

    fn natural_size(&self) -> (u32, u32) {
        self.current
            .as_ref()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0))
    }

    fn render(&self, region: Region, width: u32, height: u32) -> Result<RgbaImage, SourceError> {
        let frame = self.current.as_ref().ok_or(SourceError::NotInitialized)?;
        Ok(draw_region(frame, region, width, height))
    }

    fn torch_supported(&self) -> bool {
        true
    }

    fn set_torch(&mut self, enabled: bool) -> Result<(), SourceError> {
        if self.config.is_none() {
            return Err(SourceError::NotInitialized);
        }
        self.torch_on = enabled;
        Ok(())
    }
}

/// Renders a page of word blocks on slightly shaded paper.
fn render_page(rng: &mut ChaCha8Rng, width: u32, height: u32) -> RgbaImage {
    let mut page = RgbaImage::from_fn(width, height, |_, y| {
        let shade = PAPER - (y * 12 / height.max(1)) as u8;
        Rgba([shade, shade, shade.saturating_sub(4), 255])
    });

    let margin_x = width / 12;
    let margin_y = height / 10;
    let line_height = (height / 16).max(2);
    let block_height = (line_height * 4 / 5).max(1);
    let gap = (width / 40).max(1);
    let min_word = (width / 20).max(1);
    let word_span = (width / 6).saturating_sub(min_word).max(1);

    let mut y = margin_y;
    while y + block_height < height.saturating_sub(margin_y) {
        // Roughly one line in five is left blank, like paragraph breaks.
        if rng.next_u32() % 5 != 0 {
            let mut x = margin_x;
            loop {
                let word = min_word + rng.next_u32() % word_span;
                if x + word > width.saturating_sub(margin_x) {
                    break;
                }
                for py in y..y + block_height {
                    for px in x..x + word {
                        page.put_pixel(px, py, Rgba([INK, INK, INK + 6, 255]));
                    }
                }
                x += word + gap;
            }
        }
        y += line_height;
    }
    page
}

/// Pulls every channel toward mid-grey, flattening contrast.
fn wash_out(frame: &mut RgbaImage) {
    for pixel in frame.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = ((*channel as u16 + 3 * 128) / 4) as u8;
        }
    }
}

fn brighten(frame: &mut RgbaImage, amount: u8) {
    for pixel in frame.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = channel.saturating_add(amount);
        }
    }
}
