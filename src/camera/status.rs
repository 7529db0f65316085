//! Status and progress reporting.
//!
//! The controller reports a tier (the visual class) and a human-readable
//! line on every tick and every milestone. Where it goes is up to the
//! sink: a UI, the log, or a recording buffer for tests.

use crate::analysis::QualityTier;
use std::sync::{Arc, Mutex};

/// Status lines emitted by the controller.
pub mod messages {
    pub const STARTED: &str = "Camera started";
    pub const UNAVAILABLE: &str = "Could not access the camera";
    pub const GOOD: &str = "Ready to capture";
    pub const MID: &str = "Almost ready, adjust slightly";
    pub const BAD: &str = "Too blurry or glare";
    pub const CAPTURED: &str = "Image captured";
    pub const STOPPED: &str = "Camera stopped";
    pub const DISCARDED: &str = "Discarded: too similar";
    pub const MANUAL: &str = "Manual capture requested";
    pub const TORCH_ON: &str = "Torch on";
    pub const TORCH_OFF: &str = "Torch off";
    pub const TORCH_UNAVAILABLE: &str = "Torch unavailable";

    /// Progress line for a running consensus session.
    pub fn progress(collected: usize, target: usize) -> String {
        format!("Auto-consensus {collected}/{target}")
    }

    pub fn consensus_complete(collected: usize) -> String {
        format!("Auto-consensus complete: {collected} frames")
    }

    pub fn consensus_timed_out(collected: usize, target: usize) -> String {
        format!("Auto-consensus timed out: {collected}/{target} frames")
    }
}

/// Status line for a tier.
pub fn tier_message(tier: QualityTier) -> &'static str {
    match tier {
        QualityTier::Good => messages::GOOD,
        QualityTier::Mid => messages::MID,
        QualityTier::Bad => messages::BAD,
    }
}

/// Receiver of status and progress updates.
pub trait StatusSink: Send {
    /// Called on every tick and every milestone.
    fn status(&mut self, tier: QualityTier, message: &str);

    /// Called with accepted/target counts during batch collection.
    fn progress(&mut self, _collected: usize, _target: usize) {}
}

/// Sink that forwards updates to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn status(&mut self, tier: QualityTier, message: &str) {
        tracing::debug!(%tier, message, "Status");
    }

    fn progress(&mut self, collected: usize, target: usize) {
        tracing::info!(collected, target, "Consensus progress");
    }
}

/// One recorded status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub tier: QualityTier,
    pub message: String,
}

#[derive(Debug, Default)]
struct StatusRecord {
    updates: Vec<StatusUpdate>,
    progress: Vec<(usize, usize)>,
}

/// Sink that records every update. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct StatusLog {
    record: Arc<Mutex<StatusRecord>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All status updates so far.
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.record
            .lock()
            .map(|r| r.updates.clone())
            .unwrap_or_default()
    }

    /// All status messages so far.
    pub fn messages(&self) -> Vec<String> {
        self.updates().into_iter().map(|u| u.message).collect()
    }

    /// All progress reports so far.
    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.record
            .lock()
            .map(|r| r.progress.clone())
            .unwrap_or_default()
    }

    /// Most recent status update.
    pub fn last(&self) -> Option<StatusUpdate> {
        self.record
            .lock()
            .ok()
            .and_then(|r| r.updates.last().cloned())
    }

    /// Returns true if `message` was ever reported.
    pub fn contains(&self, message: &str) -> bool {
        self.record
            .lock()
            .map(|r| r.updates.iter().any(|u| u.message == message))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut record) = self.record.lock() {
            record.updates.clear();
            record.progress.clear();
        }
    }
}

impl StatusSink for StatusLog {
    fn status(&mut self, tier: QualityTier, message: &str) {
        if let Ok(mut record) = self.record.lock() {
            record.updates.push(StatusUpdate {
                tier,
                message: message.to_owned(),
            });
        }
    }

    fn progress(&mut self, collected: usize, target: usize) {
        if let Ok(mut record) = self.record.lock() {
            record.progress.push((collected, target));
        }
    }
}
