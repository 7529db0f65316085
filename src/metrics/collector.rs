//! Metrics collection and registry.

use crate::camera::CameraStats;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of controller state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Ticks that produced a quality sample.
    pub ticks: u64,
    /// Ticks skipped for lack of a frame.
    pub skipped_ticks: u64,
    pub good_ticks: u64,
    pub mid_ticks: u64,
    pub bad_ticks: u64,
    /// Current consecutive-GOOD streak.
    pub consecutive_good: u32,
    /// Frames produced by the capture pipeline.
    pub captures: u64,
    /// Batch attempts held back by the cooldown.
    pub cooldown_skips: u64,
    pub candidates_accepted: u64,
    pub candidates_rejected: u64,
    pub sessions_completed: u64,
    pub sessions_timed_out: u64,
    pub sessions_aborted: u64,
    /// Sharpness of the latest sample.
    pub sharpness: Option<f64>,
    /// Brightness of the latest sample.
    pub brightness: Option<f64>,
}

impl MetricsSnapshot {
    /// Creates a snapshot from controller statistics.
    pub fn from_stats(stats: &CameraStats) -> Self {
        Self {
            ticks: stats.ticks,
            skipped_ticks: stats.skipped_ticks,
            good_ticks: stats.good_ticks,
            mid_ticks: stats.mid_ticks,
            bad_ticks: stats.bad_ticks,
            consecutive_good: stats.consecutive_good,
            captures: stats.captures,
            cooldown_skips: stats.cooldown_skips,
            candidates_accepted: stats.candidates_accepted,
            candidates_rejected: stats.candidates_rejected,
            sessions_completed: stats.sessions_completed,
            sessions_timed_out: stats.sessions_timed_out,
            sessions_aborted: stats.sessions_aborted,
            sharpness: stats.last_sample.map(|s| s.sharpness),
            brightness: stats.last_sample.map(|s| s.brightness),
        }
    }
}

/// Prometheus metrics registry for capture monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Tick metrics
    ticks_total: IntCounter,
    skipped_ticks_total: IntCounter,
    good_ticks_total: IntCounter,
    mid_ticks_total: IntCounter,
    bad_ticks_total: IntCounter,
    consecutive_good: IntGauge,

    // Quality metrics
    sharpness: Gauge,
    brightness: Gauge,

    // Capture metrics
    captures_total: IntCounter,
    cooldown_skips_total: IntCounter,

    // Consensus metrics
    candidates_accepted_total: IntCounter,
    candidates_rejected_total: IntCounter,
    sessions_completed_total: IntCounter,
    sessions_timed_out_total: IntCounter,
    sessions_aborted_total: IntCounter,
}

/// Increments a counter up to `target`; counters never go backwards.
fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all capture metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let ticks_total = IntCounter::new(
            "doc_capture_ticks_total",
            "Total number of ticks that produced a quality sample",
        )?;
        let skipped_ticks_total = IntCounter::new(
            "doc_capture_skipped_ticks_total",
            "Total number of ticks skipped because no frame was available",
        )?;
        let good_ticks_total =
            IntCounter::new("doc_capture_good_ticks_total", "Ticks classified GOOD")?;
        let mid_ticks_total =
            IntCounter::new("doc_capture_mid_ticks_total", "Ticks classified MID")?;
        let bad_ticks_total =
            IntCounter::new("doc_capture_bad_ticks_total", "Ticks classified BAD")?;
        let consecutive_good = IntGauge::new(
            "doc_capture_consecutive_good",
            "Current number of consecutive GOOD ticks",
        )?;

        let sharpness = Gauge::new(
            "doc_capture_sharpness",
            "Sharpness of the latest sample (luma variance / 100)",
        )?;
        let brightness = Gauge::new(
            "doc_capture_brightness",
            "Brightness of the latest sample (mean luma)",
        )?;

        let captures_total = IntCounter::new(
            "doc_capture_captures_total",
            "Total frames produced by the capture pipeline",
        )?;
        let cooldown_skips_total = IntCounter::new(
            "doc_capture_cooldown_skips_total",
            "Batch capture attempts held back by the cooldown",
        )?;

        let candidates_accepted_total = IntCounter::new(
            "doc_capture_consensus_accepted_total",
            "Consensus candidates accepted as distinct",
        )?;
        let candidates_rejected_total = IntCounter::new(
            "doc_capture_consensus_rejected_total",
            "Consensus candidates discarded as too similar",
        )?;
        let sessions_completed_total = IntCounter::new(
            "doc_capture_consensus_sessions_completed_total",
            "Consensus sessions that reached their target",
        )?;
        let sessions_timed_out_total = IntCounter::new(
            "doc_capture_consensus_sessions_timed_out_total",
            "Consensus sessions that ended at the deadline",
        )?;
        let sessions_aborted_total = IntCounter::new(
            "doc_capture_consensus_sessions_aborted_total",
            "Consensus sessions discarded by stop or restart",
        )?;

        // Register all metrics
        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(skipped_ticks_total.clone()))?;
        registry.register(Box::new(good_ticks_total.clone()))?;
        registry.register(Box::new(mid_ticks_total.clone()))?;
        registry.register(Box::new(bad_ticks_total.clone()))?;
        registry.register(Box::new(consecutive_good.clone()))?;
        registry.register(Box::new(sharpness.clone()))?;
        registry.register(Box::new(brightness.clone()))?;
        registry.register(Box::new(captures_total.clone()))?;
        registry.register(Box::new(cooldown_skips_total.clone()))?;
        registry.register(Box::new(candidates_accepted_total.clone()))?;
        registry.register(Box::new(candidates_rejected_total.clone()))?;
        registry.register(Box::new(sessions_completed_total.clone()))?;
        registry.register(Box::new(sessions_timed_out_total.clone()))?;
        registry.register(Box::new(sessions_aborted_total.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            skipped_ticks_total,
            good_ticks_total,
            mid_ticks_total,
            bad_ticks_total,
            consecutive_good,
            sharpness,
            brightness,
            captures_total,
            cooldown_skips_total,
            candidates_accepted_total,
            candidates_rejected_total,
            sessions_completed_total,
            sessions_timed_out_total,
            sessions_aborted_total,
        })
    }

    /// Updates all metrics from a snapshot of controller state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.ticks_total, snapshot.ticks);
        advance(&self.skipped_ticks_total, snapshot.skipped_ticks);
        advance(&self.good_ticks_total, snapshot.good_ticks);
        advance(&self.mid_ticks_total, snapshot.mid_ticks);
        advance(&self.bad_ticks_total, snapshot.bad_ticks);
        self.consecutive_good.set(snapshot.consecutive_good as i64);

        // Only update if a sample exists
        if let Some(sharpness) = snapshot.sharpness {
            self.sharpness.set(sharpness);
        }
        if let Some(brightness) = snapshot.brightness {
            self.brightness.set(brightness);
        }

        advance(&self.captures_total, snapshot.captures);
        advance(&self.cooldown_skips_total, snapshot.cooldown_skips);

        advance(&self.candidates_accepted_total, snapshot.candidates_accepted);
        advance(&self.candidates_rejected_total, snapshot.candidates_rejected);
        advance(&self.sessions_completed_total, snapshot.sessions_completed);
        advance(&self.sessions_timed_out_total, snapshot.sessions_timed_out);
        advance(&self.sessions_aborted_total, snapshot.sessions_aborted);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
