//! The capture controller.
//!
//! [`SmartCamera`] is the quality/debounce state machine: it scores the live
//! frame on every tick, reports status, and fires the capture pipeline once
//! the document has been steady long enough. With the `runtime` feature,
//! [`CameraRunner`] drives it from a tokio interval and deadline timer.
//!
//! # Example
//!
//! ```no_run
//! use doc_capture::camera::{CameraEvent, SmartCamera};
//! use doc_capture::capture::MockCamera;
//! use std::time::{Duration, Instant};
//!
//! let mut camera = SmartCamera::new(MockCamera::new(7));
//! camera.start().expect("mock camera opens");
//!
//! let mut now = Instant::now();
//! loop {
//!     if let Ok(Some(CameraEvent::Captured(frame))) = camera.tick(now) {
//!         println!("captured {} bytes, hash {}", frame.encoded().len(), frame.hash());
//!         break;
//!     }
//!     now += Duration::from_millis(300);
//! }
//! camera.stop();
//! ```

mod controller;
#[cfg(feature = "runtime")]
mod runner;
mod status;

pub use controller::{
    CameraEvent, CameraState, CameraStats, CaptureError, MonitorConfig, SmartCamera,
};
#[cfg(feature = "runtime")]
pub use runner::{CameraCommand, CameraHandle, CameraRunner, RunnerClosed};
pub use status::{messages, tier_message, StatusLog, StatusSink, StatusUpdate, TracingStatusSink};
