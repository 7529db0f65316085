//! Live Document Capture Library
//!
//! Helps a user photograph a physical document for downstream OCR. A live
//! video source is scored at a fixed cadence for focus and exposure, the
//! score is debounced into a steady ready signal, and the capture pipeline
//! either fires once (single-shot) or keeps collecting perceptually distinct
//! frames until a target count or deadline is reached (auto-consensus).
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → analysis → camera (state machine) → processing → consensus
//!   source    score      tier + debounce          normalize     diversity
//!   sampler   classify                            preprocess    cooldown
//!                                                 hash, encode  deadline
//! ```
//!
//! # Design Principles
//!
//! - **Bounded ticks**: analysis always works on fixed small renderings, so a
//!   tick costs the same whatever the device resolution
//! - **Injected time**: every state-machine call takes `now`; the tokio
//!   runner supplies it in production and tests supply synthetic clocks
//! - **Graceful absence**: torch and orientation are optional capabilities,
//!   and a source without a frame yet is skipped, not an error
//! - **Exactly-once delivery**: a consensus session ends once, either with a
//!   full batch or at its deadline; stopping aborts it without delivery
//!
//! # Example
//!
//! ```no_run
//! use doc_capture::{
//!     camera::{CameraEvent, SmartCamera},
//!     capture::MockCamera,
//! };
//! use std::time::{Duration, Instant};
//!
//! let mut camera = SmartCamera::new(MockCamera::new(42));
//! camera.start().unwrap();
//!
//! let start = Instant::now();
//! camera
//!     .start_auto_consensus(3, Duration::from_secs(15), start)
//!     .unwrap();
//!
//! for i in 0..100u32 {
//!     let now = start + Duration::from_millis(300) * i;
//!     if let Ok(Some(CameraEvent::BatchReady(batch))) = camera.tick(now) {
//!         println!("{} distinct frames ({:?})", batch.len(), batch.completion);
//!         break;
//!     }
//! }
//! camera.stop();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod camera;
pub mod capture;
pub mod consensus;
pub mod metrics;
pub mod processing;

// Re-export commonly used types at crate root
pub use analysis::{QualitySample, QualityThresholds, QualityTier};
pub use camera::{CameraEvent, CameraState, CaptureError, SmartCamera, StatusSink};
#[cfg(feature = "runtime")]
pub use camera::{CameraHandle, CameraRunner};
pub use capture::{CaptureConfig, CaptureFrame, FileConfig, LiveSource, MockCamera, StillSource};
pub use consensus::{BatchOutcome, Completion, ConsensusCollector};
pub use processing::{hamming, DifferenceHasher, PerceptualHash};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
