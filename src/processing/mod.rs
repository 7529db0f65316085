//! Capture pipeline stages.
//!
//! A triggered capture flows through these stages in order:
//!
//! 1. **Normalize** - rotate portrait frames, cover-crop to 16:9 and scale to
//!    the fixed output resolution
//! 2. **Preprocess** - greyscale conversion and contrast stretch, optionally
//!    followed by a light blur
//! 3. **Hash** - difference hash of the preprocessed buffer
//! 4. **Encode** - compress the buffer into an opaque blob

mod contrast;
mod dhash;
mod encode;
mod normalize;

pub use contrast::{preprocess, smooth, stretch_contrast, PreprocessConfig};
pub use dhash::{hamming, DifferenceHasher, HashConfig, HashError, PerceptualHash, MAX_GRID_SIZE};
pub use encode::{BlobEncoder, BlobFormat, EncodeError, EncoderConfig, ImageBlobEncoder};
pub use normalize::{cover_crop, FrameNormalizer, NormalizeConfig};
