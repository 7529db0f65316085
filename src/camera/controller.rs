//! Quality/debounce state machine and capture controller.
//!
//! [`SmartCamera`] owns a live source and is driven by [`tick`](SmartCamera::tick)
//! at a fixed cadence. Every tick scores the current frame, reports its tier,
//! and feeds the debounce counter. Once the counter is steady the capture
//! pipeline runs: normalize, preprocess, hash, encode. In single-shot mode the
//! result is delivered directly; while a consensus session runs it is offered
//! to the collector instead.
//!
//! The controller performs no timing of its own. Every time-dependent call
//! takes `now`, so the same logic runs under the async runner, in a manual
//! loop, or in tests with synthetic clocks.

use super::status::{messages, tier_message, StatusSink, TracingStatusSink};
use crate::analysis::{
    AnalysisConfig, Debouncer, QualitySample, QualityScorer, QualityThresholds, QualityTier,
};
use crate::capture::{
    CaptureConfig, CaptureFrame, ConfigError, FileConfig, LiveSource, OrientationSampler,
    SourceError,
};
use crate::consensus::{
    BatchOutcome, Completion, ConsensusCollector, ConsensusConfig, ConsensusError, OfferOutcome,
};
use crate::processing::{
    preprocess, BlobEncoder, DifferenceHasher, EncodeError, FrameNormalizer, HashConfig,
    ImageBlobEncoder, NormalizeConfig, PreprocessConfig,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced by the controller.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera is not monitoring")]
    NotMonitoring,
    #[error("camera has been stopped")]
    Stopped,
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),
}

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    /// Not started, or the last start failed.
    Idle,
    /// Stream open, ticking.
    Monitoring,
    /// Stream released. Terminal.
    Stopped,
}

/// Results delivered to the consumer.
#[derive(Debug)]
pub enum CameraEvent {
    /// A single-shot or manual capture.
    Captured(CaptureFrame),
    /// A consensus session finished.
    BatchReady(BatchOutcome),
}

/// Tick cadence and debounce thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Period of the tick driver in milliseconds.
    pub tick_interval_ms: u64,
    /// Consecutive GOOD ticks before a single-shot capture.
    pub single_stability: u32,
    /// Consecutive GOOD ticks before a batch capture attempt.
    pub batch_stability: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 300,
            single_stability: 3,
            batch_stability: 2,
        }
    }
}

impl MonitorConfig {
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.tick_interval_ms",
                reason: "must be non-zero".into(),
            });
        }
        if self.single_stability == 0 || self.batch_stability == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor",
                reason: "stability thresholds must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Running counters of one controller instance.
#[derive(Debug, Clone, Default)]
pub struct CameraStats {
    /// Ticks processed while monitoring.
    pub ticks: u64,
    /// Ticks skipped because no frame was available.
    pub skipped_ticks: u64,
    pub good_ticks: u64,
    pub mid_ticks: u64,
    pub bad_ticks: u64,
    /// Frames produced by the capture pipeline.
    pub captures: u64,
    /// Batch attempts held back by the cooldown.
    pub cooldown_skips: u64,
    pub candidates_accepted: u64,
    pub candidates_rejected: u64,
    pub sessions_completed: u64,
    pub sessions_timed_out: u64,
    pub sessions_aborted: u64,
    /// Current debounce streak.
    pub consecutive_good: u32,
    /// Most recent quality measurement.
    pub last_sample: Option<QualitySample>,
    /// Orientation change, in degrees, between the last two frames accepted
    /// into a consensus session. Needs an orientation sampler.
    pub last_orientation_delta: Option<f64>,
}

/// Live document capture controller.
pub struct SmartCamera<S: LiveSource> {
    source: S,
    state: CameraState,

    capture_config: CaptureConfig,
    monitor: MonitorConfig,
    thresholds: QualityThresholds,
    scorer: QualityScorer,
    normalizer: FrameNormalizer,
    preprocess: PreprocessConfig,
    hasher: DifferenceHasher,
    encoder: Box<dyn BlobEncoder>,

    debouncer: Debouncer,
    collector: ConsensusCollector,

    sink: Box<dyn StatusSink>,
    orientation: Option<Box<dyn OrientationSampler>>,

    last_tier: QualityTier,
    torch_on: bool,
    sequence: u64,
    stats: CameraStats,
}

impl<S: LiveSource> SmartCamera<S> {
    /// Creates a controller with default settings.
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: CameraState::Idle,
            capture_config: CaptureConfig::default(),
            monitor: MonitorConfig::default(),
            thresholds: QualityThresholds::default(),
            scorer: QualityScorer::default(),
            normalizer: FrameNormalizer::default(),
            preprocess: PreprocessConfig::default(),
            hasher: DifferenceHasher::default(),
            encoder: Box::new(ImageBlobEncoder::default()),
            debouncer: Debouncer::new(),
            collector: ConsensusCollector::default(),
            sink: Box::new(TracingStatusSink),
            orientation: None,
            last_tier: QualityTier::Bad,
            torch_on: false,
            sequence: 0,
            stats: CameraStats::default(),
        }
    }

    /// Creates a controller from a loaded configuration file.
    pub fn from_config(source: S, config: &FileConfig) -> Result<Self, CaptureError> {
        let encoder = ImageBlobEncoder::new(&config.encoder)?;
        Ok(Self::new(source)
            .with_capture_config(config.capture.clone())
            .with_monitor_config(config.monitor.clone())
            .with_thresholds(config.thresholds.clone())
            .with_analysis_config(config.analysis.clone())
            .with_normalize_config(config.normalize.clone())
            .with_preprocess_config(config.preprocess.clone())
            .with_hash_config(&config.hash)
            .with_consensus_config(config.consensus.clone())
            .with_encoder(encoder))
    }

    pub fn with_capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture_config = config;
        self
    }

    /// Sets cadence and debounce thresholds, clamping zeros to the smallest
    /// usable value.
    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "Monitor config out of range, clamped");
        }
        self.monitor = MonitorConfig {
            tick_interval_ms: config.tick_interval_ms.max(1),
            single_stability: config.single_stability.max(1),
            batch_stability: config.batch_stability.max(1),
        };
        self
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_analysis_config(mut self, config: AnalysisConfig) -> Self {
        self.scorer = QualityScorer::new(config);
        self
    }

    pub fn with_normalize_config(mut self, config: NormalizeConfig) -> Self {
        self.normalizer = FrameNormalizer::new(config);
        self
    }

    pub fn with_preprocess_config(mut self, config: PreprocessConfig) -> Self {
        self.preprocess = config;
        self
    }

    pub fn with_hash_config(mut self, config: &HashConfig) -> Self {
        self.hasher = DifferenceHasher::new(config);
        self
    }

    pub fn with_consensus_config(mut self, config: ConsensusConfig) -> Self {
        self.collector = ConsensusCollector::new(config);
        self
    }

    pub fn with_encoder(mut self, encoder: impl BlobEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn with_sink(mut self, sink: impl StatusSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_orientation(mut self, sampler: impl OrientationSampler + 'static) -> Self {
        self.orientation = Some(Box::new(sampler));
        self
    }

    #[inline]
    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn monitor_config(&self) -> &MonitorConfig {
        &self.monitor
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consumes the controller, returning the source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Tier of the most recent scored tick.
    pub fn last_tier(&self) -> QualityTier {
        self.last_tier
    }

    /// Current debounce streak.
    pub fn debounce_count(&self) -> u32 {
        self.debouncer.count()
    }

    pub fn is_consensus_active(&self) -> bool {
        self.collector.is_active()
    }

    /// Deadline of the running consensus session.
    pub fn consensus_deadline(&self) -> Option<Instant> {
        self.collector.deadline()
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    /// Snapshot of the running counters.
    pub fn stats(&self) -> CameraStats {
        CameraStats {
            candidates_accepted: self.collector.total_accepted(),
            candidates_rejected: self.collector.total_rejected(),
            sessions_completed: self.collector.sessions_completed(),
            sessions_timed_out: self.collector.sessions_timed_out(),
            sessions_aborted: self.collector.sessions_aborted(),
            consecutive_good: self.debouncer.count(),
            ..self.stats.clone()
        }
    }

    /// Opens the stream and begins monitoring.
    ///
    /// On failure the controller stays idle and may be started again.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        match self.state {
            CameraState::Stopped => return Err(CaptureError::Stopped),
            CameraState::Monitoring => return Ok(()),
            CameraState::Idle => {}
        }

        if let Err(e) = self.source.open(&self.capture_config) {
            tracing::warn!(error = %e, "Failed to open live source");
            self.sink.status(QualityTier::Bad, messages::UNAVAILABLE);
            return Err(e.into());
        }

        self.state = CameraState::Monitoring;
        self.debouncer.reset();
        self.last_tier = QualityTier::Bad;

        tracing::info!(
            width = self.capture_config.width,
            height = self.capture_config.height,
            facing = ?self.capture_config.facing,
            "Camera started"
        );
        self.sink.status(QualityTier::Bad, messages::STARTED);
        Ok(())
    }

    /// Stops monitoring, aborting any consensus session without delivering
    /// it. Returns true if a running stream was released.
    ///
    /// Only a monitoring camera can stop; an idle one stays idle so a later
    /// `start` can still succeed.
    pub fn stop(&mut self) -> bool {
        if self.state != CameraState::Monitoring {
            return false;
        }

        self.collector.abort();
        self.debouncer.reset();

        if self.torch_on {
            if let Err(e) = self.source.set_torch(false) {
                tracing::debug!(error = %e, "Could not switch torch off");
            }
            self.torch_on = false;
        }
        self.source.close();

        self.state = CameraState::Stopped;
        tracing::info!(captures = self.stats.captures, "Camera stopped");
        self.sink.status(QualityTier::Bad, messages::STOPPED);
        true
    }

    /// Runs one monitoring tick.
    ///
    /// A consensus deadline that has passed ends the session first and the
    /// batch is returned in place of this tick's work.
    pub fn tick(&mut self, now: Instant) -> Result<Option<CameraEvent>, CaptureError> {
        if self.state != CameraState::Monitoring {
            return Ok(None);
        }

        if let Some(event) = self.poll_deadline(now) {
            return Ok(Some(event));
        }

        if let Err(e) = self.source.refresh() {
            tracing::warn!(error = %e, "Failed to refresh live source");
            self.stats.skipped_ticks += 1;
            return Ok(None);
        }

        let sample = match self.scorer.score(&self.source) {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                tracing::trace!("No frame available, skipping tick");
                self.stats.skipped_ticks += 1;
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to sample live source");
                self.stats.skipped_ticks += 1;
                return Ok(None);
            }
        };

        let tier = self.thresholds.classify(&sample);
        self.stats.ticks += 1;
        self.stats.last_sample = Some(sample);
        match tier {
            QualityTier::Good => self.stats.good_ticks += 1,
            QualityTier::Mid => self.stats.mid_ticks += 1,
            QualityTier::Bad => self.stats.bad_ticks += 1,
        }
        self.last_tier = tier;
        self.sink.status(tier, tier_message(tier));

        let streak = self.debouncer.record(tier);
        tracing::debug!(
            sharpness = sample.sharpness,
            brightness = sample.brightness,
            %tier,
            streak,
            "Tick"
        );

        if self.collector.is_active() {
            if !self.debouncer.is_steady(self.monitor.batch_stability) {
                return Ok(None);
            }
            if !self.collector.cooldown_elapsed(now) {
                // The streak is kept; the next tick may retry.
                self.stats.cooldown_skips += 1;
                tracing::trace!(streak, "Batch attempt held by cooldown");
                return Ok(None);
            }

            self.debouncer.consume();
            self.collector.note_attempt(now);
            return match self.capture_frame()? {
                Some(frame) => Ok(self.deliver_batch_candidate(frame, now)),
                None => Ok(None),
            };
        }

        if !self.debouncer.is_steady(self.monitor.single_stability) {
            return Ok(None);
        }

        self.debouncer.consume();
        Ok(self.capture_frame()?.map(|frame| {
            self.sink.status(QualityTier::Good, messages::CAPTURED);
            CameraEvent::Captured(frame)
        }))
    }

    /// Starts collecting `target` distinct frames within `timeout`.
    ///
    /// Any session already running is discarded.
    pub fn start_auto_consensus(
        &mut self,
        target: usize,
        timeout: Duration,
        now: Instant,
    ) -> Result<(), CaptureError> {
        match self.state {
            CameraState::Monitoring => {}
            CameraState::Idle => return Err(CaptureError::NotMonitoring),
            CameraState::Stopped => return Err(CaptureError::Stopped),
        }

        self.collector.start(target, timeout, now)?;
        self.sink.progress(0, target);
        self.sink.status(self.last_tier, &messages::progress(0, target));
        Ok(())
    }

    /// Ends the consensus session if its deadline has passed.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<CameraEvent> {
        if self.state != CameraState::Monitoring {
            return None;
        }
        let batch = self.collector.poll_deadline(now)?;
        Some(self.announce_batch(batch))
    }

    /// Captures immediately, regardless of the debounce state.
    ///
    /// Always delivers to the single-capture path. No-op unless monitoring.
    pub fn manual_capture(&mut self) -> Result<Option<CameraEvent>, CaptureError> {
        if self.state != CameraState::Monitoring {
            return Ok(None);
        }

        self.sink.status(self.last_tier, messages::MANUAL);
        if let Err(e) = self.source.refresh() {
            tracing::warn!(error = %e, "Failed to refresh live source");
        }
        Ok(self.capture_frame()?.map(|frame| {
            self.sink.status(QualityTier::Good, messages::CAPTURED);
            CameraEvent::Captured(frame)
        }))
    }

    /// Flips the torch if the source supports one. Returns the torch state.
    pub fn toggle_torch(&mut self) -> bool {
        if self.state != CameraState::Monitoring {
            return self.torch_on;
        }

        if !self.source.torch_supported() {
            tracing::warn!("Torch not supported by live source");
            self.sink.status(self.last_tier, messages::TORCH_UNAVAILABLE);
            return self.torch_on;
        }

        let enable = !self.torch_on;
        match self.source.set_torch(enable) {
            Ok(()) => {
                self.torch_on = enable;
                tracing::info!(enabled = enable, "Torch switched");
                let message = if enable {
                    messages::TORCH_ON
                } else {
                    messages::TORCH_OFF
                };
                self.sink.status(self.last_tier, message);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to switch torch");
            }
        }
        self.torch_on
    }

    /// Offers a captured candidate to the running consensus session.
    pub(crate) fn deliver_batch_candidate(
        &mut self,
        frame: CaptureFrame,
        now: Instant,
    ) -> Option<CameraEvent> {
        let turn = frame
            .orientation()
            .zip(self.collector.last_frame().and_then(|f| f.orientation()))
            .map(|(current, previous)| current.max_delta(previous));

        let outcome = self.collector.offer(frame, now);
        if turn.is_some()
            && matches!(
                outcome,
                OfferOutcome::Accepted { .. } | OfferOutcome::Completed(_)
            )
        {
            tracing::debug!(orientation_delta = ?turn, "Device moved between accepted frames");
            self.stats.last_orientation_delta = turn;
        }

        match outcome {
            OfferOutcome::Accepted { collected, target } => {
                self.sink.progress(collected, target);
                self.sink
                    .status(QualityTier::Good, &messages::progress(collected, target));
                None
            }
            OfferOutcome::Completed(batch) => Some(self.announce_batch(batch)),
            OfferOutcome::Rejected { closest_distance } => {
                tracing::debug!(closest_distance, "Discarded similar candidate");
                self.sink.status(self.last_tier, messages::DISCARDED);
                None
            }
            OfferOutcome::Inactive => {
                tracing::trace!("Candidate arrived without a session, dropped");
                None
            }
        }
    }

    fn announce_batch(&mut self, batch: BatchOutcome) -> CameraEvent {
        match batch.completion {
            Completion::TargetReached => {
                self.sink.progress(batch.len(), batch.target);
                self.sink
                    .status(QualityTier::Good, &messages::consensus_complete(batch.len()));
            }
            Completion::TimedOut => {
                self.sink.status(
                    self.last_tier,
                    &messages::consensus_timed_out(batch.len(), batch.target),
                );
            }
        }
        CameraEvent::BatchReady(batch)
    }

    /// Runs normalize, preprocess, hash and encode on the current frame.
    fn capture_frame(&mut self) -> Result<Option<CaptureFrame>, CaptureError> {
        let Some(mut image) = self.normalizer.normalize(&self.source)? else {
            tracing::debug!("No frame available for capture");
            return Ok(None);
        };

        preprocess(&mut image, &self.preprocess);
        let hash = self.hasher.hash(&image);
        let encoded = self.encoder.encode(&image)?;

        self.sequence += 1;
        self.stats.captures += 1;

        let orientation = self.orientation.as_ref().and_then(|o| o.latest());
        let frame = CaptureFrame::new(encoded, self.encoder.format(), hash, self.sequence)
            .with_orientation(orientation);

        tracing::info!(
            sequence = frame.sequence(),
            bytes = frame.encoded().len(),
            hash = %frame.hash(),
            orientation = ?frame.orientation(),
            "Frame captured"
        );
        Ok(Some(frame))
    }
}

impl<S: LiveSource + std::fmt::Debug> std::fmt::Debug for SmartCamera<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartCamera")
            .field("source", &self.source)
            .field("state", &self.state)
            .field("last_tier", &self.last_tier)
            .field("streak", &self.debouncer.count())
            .field("consensus_active", &self.collector.is_active())
            .field("captures", &self.stats.captures)
            .finish()
    }
}
