//! Delivered capture type: an encoded image with its perceptual hash.

use super::orientation::OrientationReading;
use crate::processing::{BlobFormat, PerceptualHash};
use chrono::{DateTime, Utc};

/// A single captured document frame.
///
/// Produced once by the capture pipeline and handed either to the
/// single-capture consumer or to the consensus collector. The core does
/// not retain it after delivery.
#[derive(Clone)]
pub struct CaptureFrame {
    /// Compressed image bytes.
    encoded: Vec<u8>,
    /// Format of `encoded`.
    format: BlobFormat,
    /// Difference hash of the preprocessed frame.
    hash: PerceptualHash,
    /// Wall-clock capture time.
    captured_at: DateTime<Utc>,
    /// Monotonic sequence number within one camera instance.
    sequence: u64,
    /// Device orientation at capture time, when a sampler is attached.
    orientation: Option<OrientationReading>,
}

impl CaptureFrame {
    /// Creates a new frame with the given parameters.
    pub fn new(encoded: Vec<u8>, format: BlobFormat, hash: PerceptualHash, sequence: u64) -> Self {
        Self {
            encoded,
            format,
            hash,
            captured_at: Utc::now(),
            sequence,
            orientation: None,
        }
    }

    /// Attaches an orientation reading.
    pub fn with_orientation(mut self, orientation: Option<OrientationReading>) -> Self {
        self.orientation = orientation;
        self
    }

    /// Returns the encoded image bytes.
    #[inline]
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Consumes the frame, returning the encoded bytes.
    pub fn into_encoded(self) -> Vec<u8> {
        self.encoded
    }

    #[inline]
    pub fn format(&self) -> BlobFormat {
        self.format
    }

    #[inline]
    pub fn hash(&self) -> &PerceptualHash {
        &self.hash
    }

    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn orientation(&self) -> Option<&OrientationReading> {
        self.orientation.as_ref()
    }
}

impl std::fmt::Debug for CaptureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFrame")
            .field("sequence", &self.sequence)
            .field("format", &self.format)
            .field("encoded_bytes", &self.encoded.len())
            .field("hash", &self.hash.to_string())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
