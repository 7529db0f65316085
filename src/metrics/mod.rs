//! Prometheus metrics for capture monitoring.
//!
//! The registry is fed from [`CameraStats`](crate::camera::CameraStats)
//! snapshots and rendered in the Prometheus text format.
//!
//! # Metrics Exposed
//!
//! ## Tick Metrics
//! - `doc_capture_ticks_total` - Ticks that produced a quality sample
//! - `doc_capture_skipped_ticks_total` - Ticks skipped for lack of a frame
//! - `doc_capture_{good,mid,bad}_ticks_total` - Ticks per tier
//! - `doc_capture_consecutive_good` - Current debounce streak
//!
//! ## Quality Metrics
//! - `doc_capture_sharpness` - Latest sharpness
//! - `doc_capture_brightness` - Latest brightness
//!
//! ## Capture Metrics
//! - `doc_capture_captures_total` - Frames produced by the capture pipeline
//! - `doc_capture_cooldown_skips_total` - Batch attempts held by the cooldown
//!
//! ## Consensus Metrics
//! - `doc_capture_consensus_accepted_total` - Distinct candidates accepted
//! - `doc_capture_consensus_rejected_total` - Similar candidates discarded
//! - `doc_capture_consensus_sessions_completed_total` - Sessions reaching target
//! - `doc_capture_consensus_sessions_timed_out_total` - Sessions ending at deadline
//! - `doc_capture_consensus_sessions_aborted_total` - Sessions discarded by stop
//!
//! # Example
//!
//! ```no_run
//! use doc_capture::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     ticks: 100,
//!     good_ticks: 60,
//!     captures: 4,
//!     sharpness: Some(48.0),
//!     brightness: Some(131.0),
//!     ..Default::default()
//! };
//!
//! registry.update(&snapshot);
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
