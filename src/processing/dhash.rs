//! Difference hash (dHash) perceptual fingerprints.
//!
//! The frame is rendered down to an (S+1) x S grey grid and each cell is
//! compared with its right-hand neighbour. The S² comparison bits ignore
//! uniform brightness shifts but flip when the content moves or changes,
//! which makes the Hamming distance between two hashes a cheap
//! near-duplicate measure.

use crate::analysis::luma;
use crate::capture::ConfigError;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from hash parsing and comparison.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("hash lengths differ: {left} vs {right} bits")]
    LengthMismatch { left: usize, right: usize },
    #[error("invalid hash digit {0:?} (expected '0' or '1')")]
    InvalidDigit(char),
}

/// Fixed-length bit string produced by [`DifferenceHasher`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash {
    /// Bits packed little-end first into 64-bit words.
    words: Vec<u64>,
    /// Number of meaningful bits.
    len: usize,
}

impl PerceptualHash {
    /// All-zero hash of `len` bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Builds a hash from bits in order.
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut hash = Self::zeros(0);
        for bit in bits {
            if hash.len % 64 == 0 {
                hash.words.push(0);
            }
            if bit {
                hash.words[hash.len / 64] |= 1 << (hash.len % 64);
            }
            hash.len += 1;
        }
        hash
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns bit `index`, or `None` past the end.
    pub fn bit(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.words[index / 64] & (1 << (index % 64)) != 0)
    }

    /// Iterates over the bits in order.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.words[i / 64] & (1 << (i % 64)) != 0)
    }

    /// Number of positions at which the two hashes differ.
    pub fn hamming(&self, other: &PerceptualHash) -> Result<u32, HashError> {
        hamming(self, other)
    }
}

/// Number of differing bit positions between equal-length hashes.
pub fn hamming(a: &PerceptualHash, b: &PerceptualHash) -> Result<u32, HashError> {
    if a.len != b.len {
        return Err(HashError::LengthMismatch {
            left: a.len,
            right: b.len,
        });
    }
    Ok(a
        .words
        .iter()
        .zip(b.words.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum())
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PerceptualHash({self})")
    }
}

impl FromStr for PerceptualHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(HashError::InvalidDigit(other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_bits(bits))
    }
}

/// Largest supported hash grid.
pub const MAX_GRID_SIZE: u32 = 32;

/// Hash grid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Grid size S; hashes are S² bits long.
    pub grid_size: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self { grid_size: 8 }
    }
}

impl HashConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "hash.grid_size",
                reason: format!("{} is outside 1..={}", self.grid_size, MAX_GRID_SIZE),
            });
        }
        Ok(())
    }
}

/// Computes difference hashes.
#[derive(Debug, Clone)]
pub struct DifferenceHasher {
    grid_size: u32,
}

impl DifferenceHasher {
    /// Creates a hasher; the grid size is clamped to `1..=MAX_GRID_SIZE`.
    pub fn new(config: &HashConfig) -> Self {
        let grid_size = config.grid_size.clamp(1, MAX_GRID_SIZE);
        if grid_size != config.grid_size {
            tracing::warn!(
                requested = config.grid_size,
                used = grid_size,
                "Hash grid size out of range, clamped"
            );
        }
        Self { grid_size }
    }

    /// Length of produced hashes in bits.
    pub fn hash_len(&self) -> usize {
        (self.grid_size * self.grid_size) as usize
    }

    /// Hashes a frame. An empty frame hashes to all zeros.
    pub fn hash(&self, image: &RgbaImage) -> PerceptualHash {
        let size = self.grid_size;
        if image.width() == 0 || image.height() == 0 {
            return PerceptualHash::zeros(self.hash_len());
        }

        let grid = imageops::resize(image, size + 1, size, FilterType::Triangle);
        let grey = |x: u32, y: u32| {
            let p = grid.get_pixel(x, y);
            luma(p[0], p[1], p[2])
        };

        PerceptualHash::from_bits(
            (0..size).flat_map(|y| (0..size).map(move |x| (x, y)))
                .map(|(x, y)| grey(x, y) > grey(x + 1, y)),
        )
    }
}

impl Default for DifferenceHasher {
    fn default() -> Self {
        Self::new(&HashConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32, falling: bool) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            let v = (x * 255 / (width - 1)) as u8;
            let v = if falling { 255 - v } else { v };
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn test_default_length_is_64() {
        let hash = DifferenceHasher::default().hash(&gradient(64, 48, false));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_gradient_directions() {
        let hasher = DifferenceHasher::default();

        // Brightness falling to the right: every left cell is brighter.
        let falling = hasher.hash(&gradient(90, 80, true));
        assert!(falling.bits().all(|b| b));

        // Rising to the right: no cell is brighter than its neighbour.
        let rising = hasher.hash(&gradient(90, 80, false));
        assert!(rising.bits().all(|b| !b));

        assert_eq!(hamming(&falling, &rising), Ok(64));
    }

    #[test]
    fn test_empty_frame_hashes_to_zeros() {
        let hash = DifferenceHasher::default().hash(&RgbaImage::new(0, 0));
        assert_eq!(hash, PerceptualHash::zeros(64));
    }

    #[test]
    fn test_length_mismatch() {
        let a = PerceptualHash::zeros(64);
        let b = PerceptualHash::zeros(16);
        assert_eq!(
            hamming(&a, &b),
            Err(HashError::LengthMismatch { left: 64, right: 16 })
        );
    }

    #[test]
    fn test_string_form() {
        let hash: PerceptualHash = "1011".parse().unwrap();
        assert_eq!(hash.len(), 4);
        assert_eq!(hash.bit(0), Some(true));
        assert_eq!(hash.bit(1), Some(false));
        assert_eq!(hash.bit(4), None);
        assert_eq!(hash.to_string(), "1011");

        assert_eq!(
            "10x1".parse::<PerceptualHash>(),
            Err(HashError::InvalidDigit('x'))
        );
    }

    #[test]
    fn test_out_of_range_grid_is_clamped() {
        let hasher = DifferenceHasher::new(&HashConfig { grid_size: u32::MAX });
        assert_eq!(hasher.hash_len(), (MAX_GRID_SIZE * MAX_GRID_SIZE) as usize);
        assert_eq!(hasher.hash(&RgbaImage::new(64, 64)).len(), hasher.hash_len());

        let hasher = DifferenceHasher::new(&HashConfig { grid_size: 0 });
        assert_eq!(hasher.hash_len(), 1);
    }

    #[test]
    fn test_grid_size_sets_length() {
        let hasher = DifferenceHasher::new(&HashConfig { grid_size: 16 });
        assert_eq!(hasher.hash(&gradient(200, 100, true)).len(), 256);
    }

    proptest! {
        #[test]
        fn prop_hamming_symmetric(
            a in proptest::collection::vec(any::<bool>(), 64),
            b in proptest::collection::vec(any::<bool>(), 64),
        ) {
            let a = PerceptualHash::from_bits(a);
            let b = PerceptualHash::from_bits(b);
            prop_assert_eq!(hamming(&a, &b), hamming(&b, &a));
            prop_assert_eq!(hamming(&a, &a), Ok(0));
        }

        #[test]
        fn prop_hamming_counts_differences(
            bits in proptest::collection::vec(any::<bool>(), 1..150),
            flips in proptest::collection::vec(any::<bool>(), 150),
        ) {
            let a = PerceptualHash::from_bits(bits.iter().copied());
            let b = PerceptualHash::from_bits(bits.iter().zip(flips.iter()).map(|(&x, &f)| x ^ f));
            let expected = bits.iter().zip(flips.iter()).filter(|(_, &f)| f).count() as u32;
            prop_assert_eq!(hamming(&a, &b), Ok(expected));
        }

        #[test]
        fn prop_dhash_deterministic(pixels in proptest::collection::vec(any::<u8>(), 12 * 10)) {
            let image = RgbaImage::from_fn(12, 10, |x, y| {
                let v = pixels[(y * 12 + x) as usize];
                Rgba([v, v, v, 255])
            });
            let hasher = DifferenceHasher::default();
            prop_assert_eq!(hasher.hash(&image), hasher.hash(&image));
        }
    }
}
