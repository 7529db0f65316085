//! Perceptually diverse batch accumulation.
//!
//! A session collects up to `target` frames whose hashes are pairwise at
//! least `diversity_threshold` bits apart. It ends exactly once: either the
//! target is reached, or the deadline passes and whatever was collected is
//! handed over. Aborting discards the session without an outcome.

use crate::capture::{CaptureFrame, ConfigError};
use crate::processing::hamming;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from starting a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("consensus target must be at least 1")]
    InvalidTarget,
}

/// Configuration for the consensus collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Minimum Hamming distance to every collected hash for a candidate to
    /// be accepted.
    pub diversity_threshold: u32,
    /// Minimum time between two batch capture attempts, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            diversity_threshold: 12, // ~19% of a 64-bit hash
            cooldown_ms: 800,
        }
    }
}

impl ConsensusConfig {
    #[inline]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.diversity_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "consensus.diversity_threshold",
                reason: "must be at least 1 bit".into(),
            });
        }
        Ok(())
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The target count was collected.
    TargetReached,
    /// The deadline passed first; the batch may hold fewer frames.
    TimedOut,
}

/// The delivered result of a finished session.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Accepted frames in acceptance order.
    pub frames: Vec<CaptureFrame>,
    pub target: usize,
    pub completion: Completion,
}

impl BatchOutcome {
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Result of offering a candidate frame.
#[derive(Debug)]
pub enum OfferOutcome {
    /// Added to the batch; the session continues.
    Accepted { collected: usize, target: usize },
    /// The offer ended the session.
    Completed(BatchOutcome),
    /// Too close to a frame already collected.
    Rejected { closest_distance: u32 },
    /// No session is running.
    Inactive,
}

#[derive(Debug)]
struct Session {
    target: usize,
    frames: Vec<CaptureFrame>,
    deadline: Instant,
    last_attempt: Option<Instant>,
}

/// Collects mutually distinct frames for one session at a time.
#[derive(Debug)]
pub struct ConsensusCollector {
    config: ConsensusConfig,
    session: Option<Session>,
    /// Candidates accepted across all sessions.
    total_accepted: u64,
    /// Candidates rejected as too similar across all sessions.
    total_rejected: u64,
    /// Sessions that reached their target.
    sessions_completed: u64,
    /// Sessions that ended at the deadline.
    sessions_timed_out: u64,
    /// Sessions discarded by an abort or a restart.
    sessions_aborted: u64,
}

impl ConsensusCollector {
    /// Creates an idle collector.
    pub fn new(config: ConsensusConfig) -> Self {
        Self {
            config,
            session: None,
            total_accepted: 0,
            total_rejected: 0,
            sessions_completed: 0,
            sessions_timed_out: 0,
            sessions_aborted: 0,
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Starts a new session, discarding any session already running.
    pub fn start(
        &mut self,
        target: usize,
        timeout: Duration,
        now: Instant,
    ) -> Result<(), ConsensusError> {
        if target == 0 {
            return Err(ConsensusError::InvalidTarget);
        }

        if self.session.is_some() {
            tracing::info!("Replacing running consensus session");
            self.abort();
        }

        // Overflowing deadlines effectively never fire.
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365));

        self.session = Some(Session {
            target,
            frames: Vec::with_capacity(target),
            deadline,
            last_attempt: None,
        });

        tracing::info!(
            target,
            timeout_ms = timeout.as_millis() as u64,
            threshold = self.config.diversity_threshold,
            "Consensus session started"
        );
        Ok(())
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Deadline of the running session.
    pub fn deadline(&self) -> Option<Instant> {
        self.session.as_ref().map(|s| s.deadline)
    }

    /// Frames collected so far in the running session.
    pub fn collected(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.frames.len())
    }

    /// Most recently accepted frame of the running session.
    pub fn last_frame(&self) -> Option<&CaptureFrame> {
        self.session.as_ref().and_then(|s| s.frames.last())
    }

    /// Target of the running session.
    pub fn target(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.target)
    }

    /// Returns true if a capture attempt is allowed at `now`.
    ///
    /// The first attempt of a session is never held back.
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.session.as_ref().and_then(|s| s.last_attempt) {
            Some(last) => now.saturating_duration_since(last) >= self.config.cooldown(),
            None => true,
        }
    }

    /// Records a capture attempt, accepted or not, for the cooldown.
    pub fn note_attempt(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.last_attempt = Some(now);
        }
    }

    /// Offers a candidate frame to the running session.
    ///
    /// A session whose deadline has already passed times out first and the
    /// candidate is dropped.
    pub fn offer(&mut self, frame: CaptureFrame, now: Instant) -> OfferOutcome {
        if let Some(outcome) = self.poll_deadline(now) {
            return OfferOutcome::Completed(outcome);
        }

        let threshold = self.config.diversity_threshold;
        let Some(session) = self.session.as_mut() else {
            return OfferOutcome::Inactive;
        };

        let mut closest = u32::MAX;
        for kept in &session.frames {
            match hamming(kept.hash(), frame.hash()) {
                Ok(distance) => closest = closest.min(distance),
                Err(e) => {
                    tracing::warn!(error = %e, "Candidate hash not comparable, rejecting");
                    closest = 0;
                    break;
                }
            }
        }

        if closest < threshold {
            self.total_rejected += 1;
            tracing::debug!(
                closest_distance = closest,
                threshold,
                collected = session.frames.len(),
                "Candidate too similar"
            );
            return OfferOutcome::Rejected {
                closest_distance: closest,
            };
        }

        session.frames.push(frame);
        self.total_accepted += 1;
        let collected = session.frames.len();
        let target = session.target;

        tracing::debug!(
            collected,
            target,
            closest_distance = closest,
            "Candidate accepted"
        );

        if collected >= target {
            OfferOutcome::Completed(self.finish(Completion::TargetReached))
        } else {
            OfferOutcome::Accepted { collected, target }
        }
    }

    /// Ends the running session if its deadline has passed.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<BatchOutcome> {
        let expired = self.session.as_ref().is_some_and(|s| now >= s.deadline);
        expired.then(|| self.finish(Completion::TimedOut))
    }

    /// Discards the running session without an outcome.
    ///
    /// Returns true if a session was running.
    pub fn abort(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                self.sessions_aborted += 1;
                tracing::info!(
                    discarded = session.frames.len(),
                    target = session.target,
                    "Consensus session aborted"
                );
                true
            }
            None => false,
        }
    }

    fn finish(&mut self, completion: Completion) -> BatchOutcome {
        // Only reachable with a running session.
        let (frames, target) = self
            .session
            .take()
            .map(|s| (s.frames, s.target))
            .unwrap_or_default();

        match completion {
            Completion::TargetReached => self.sessions_completed += 1,
            Completion::TimedOut => self.sessions_timed_out += 1,
        }

        tracing::info!(
            collected = frames.len(),
            target,
            ?completion,
            "Consensus session finished"
        );

        BatchOutcome {
            frames,
            target,
            completion,
        }
    }

    pub fn total_accepted(&self) -> u64 {
        self.total_accepted
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected
    }

    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed
    }

    pub fn sessions_timed_out(&self) -> u64 {
        self.sessions_timed_out
    }

    pub fn sessions_aborted(&self) -> u64 {
        self.sessions_aborted
    }
}

impl Default for ConsensusCollector {
    fn default() -> Self {
        Self::new(ConsensusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{BlobFormat, PerceptualHash};
    use proptest::prelude::*;

    /// 64-bit hash with bits `[10 * block, 10 * block + 10)` set. Any two
    /// distinct blocks are 20 bits apart.
    fn block_hash(block: usize) -> PerceptualHash {
        PerceptualHash::from_bits((0..64).map(|i| i / 10 == block))
    }

    fn frame(hash: PerceptualHash, sequence: u64) -> CaptureFrame {
        CaptureFrame::new(vec![sequence as u8], BlobFormat::Jpeg, hash, sequence)
    }

    #[test]
    fn test_inactive_by_default() {
        let mut collector = ConsensusCollector::default();
        let now = Instant::now();

        assert!(!collector.is_active());
        assert!(collector.poll_deadline(now).is_none());
        assert!(matches!(
            collector.offer(frame(block_hash(0), 0), now),
            OfferOutcome::Inactive
        ));
        assert!(!collector.abort());
    }

    #[test]
    fn test_zero_target_rejected() {
        let mut collector = ConsensusCollector::default();
        assert_eq!(
            collector.start(0, Duration::from_secs(1), Instant::now()),
            Err(ConsensusError::InvalidTarget)
        );
        assert!(!collector.is_active());
    }

    #[test]
    fn test_target_reached_in_order() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(5, Duration::from_millis(15_000), start).unwrap();

        let mut outcome = None;
        for i in 0..5 {
            let now = start + Duration::from_millis(900 * (i as u64 + 1));
            assert!(collector.cooldown_elapsed(now));
            collector.note_attempt(now);
            match collector.offer(frame(block_hash(i), i as u64), now) {
                OfferOutcome::Accepted { collected, target } => {
                    assert_eq!(collected, i + 1);
                    assert_eq!(target, 5);
                }
                OfferOutcome::Completed(batch) => outcome = Some(batch),
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        let batch = outcome.unwrap();
        assert_eq!(batch.completion, Completion::TargetReached);
        let sequences: Vec<u64> = batch.frames.iter().map(|f| f.sequence()).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert!(!collector.is_active());
        assert_eq!(collector.sessions_completed(), 1);

        // The deadline no longer fires once finished.
        assert!(collector
            .poll_deadline(start + Duration::from_secs(20))
            .is_none());
    }

    #[test]
    fn test_timeout_delivers_partial_batch() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(5, Duration::from_millis(5_000), start).unwrap();

        for i in 0..2 {
            let outcome = collector.offer(frame(block_hash(i), i as u64), start);
            assert!(matches!(outcome, OfferOutcome::Accepted { .. }));
        }

        assert!(collector
            .poll_deadline(start + Duration::from_millis(4_999))
            .is_none());

        let batch = collector
            .poll_deadline(start + Duration::from_millis(5_000))
            .unwrap();
        assert_eq!(batch.completion, Completion::TimedOut);
        assert_eq!(batch.len(), 2);
        assert_eq!(collector.sessions_timed_out(), 1);

        // Exactly once.
        assert!(collector
            .poll_deadline(start + Duration::from_millis(6_000))
            .is_none());
    }

    #[test]
    fn test_empty_timeout() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(3, Duration::from_millis(100), start).unwrap();

        let batch = collector
            .poll_deadline(start + Duration::from_millis(100))
            .unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.target, 3);
    }

    #[test]
    fn test_similar_candidate_rejected() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(5, Duration::from_secs(15), start).unwrap();

        let base = block_hash(0);
        collector.offer(frame(base.clone(), 0), start);

        // Flip 5 bits outside the set block.
        let near = PerceptualHash::from_bits(
            base.bits().enumerate().map(|(i, b)| if (20..25).contains(&i) { !b } else { b }),
        );
        match collector.offer(frame(near, 1), start) {
            OfferOutcome::Rejected { closest_distance } => assert_eq!(closest_distance, 5),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(collector.collected(), 1);
        assert_eq!(collector.total_rejected(), 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut collector = ConsensusCollector::new(ConsensusConfig {
            diversity_threshold: 20,
            ..Default::default()
        });
        let start = Instant::now();
        collector.start(3, Duration::from_secs(1), start).unwrap();

        collector.offer(frame(block_hash(0), 0), start);
        assert!(matches!(
            collector.offer(frame(block_hash(1), 1), start),
            OfferOutcome::Accepted { collected: 2, .. }
        ));
    }

    #[test]
    fn test_mismatched_hash_rejected() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(3, Duration::from_secs(1), start).unwrap();

        collector.offer(frame(block_hash(0), 0), start);
        assert!(matches!(
            collector.offer(frame(PerceptualHash::zeros(16), 1), start),
            OfferOutcome::Rejected { .. }
        ));
    }

    #[test]
    fn test_cooldown() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(3, Duration::from_secs(10), start).unwrap();

        assert!(collector.cooldown_elapsed(start));
        collector.note_attempt(start);
        assert!(!collector.cooldown_elapsed(start + Duration::from_millis(799)));
        assert!(collector.cooldown_elapsed(start + Duration::from_millis(800)));
    }

    #[test]
    fn test_abort_discards_session() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(5, Duration::from_secs(5), start).unwrap();
        collector.offer(frame(block_hash(0), 0), start);

        assert!(collector.abort());
        assert!(!collector.is_active());
        assert_eq!(collector.collected(), 0);
        assert!(collector
            .poll_deadline(start + Duration::from_secs(10))
            .is_none());
        assert_eq!(collector.sessions_aborted(), 1);
    }

    #[test]
    fn test_restart_resets_collection() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(5, Duration::from_secs(5), start).unwrap();
        collector.offer(frame(block_hash(0), 0), start);

        collector.start(2, Duration::from_secs(5), start).unwrap();
        assert_eq!(collector.collected(), 0);
        assert_eq!(collector.target(), Some(2));

        // The same hash is welcome again in the new session.
        assert!(matches!(
            collector.offer(frame(block_hash(0), 1), start),
            OfferOutcome::Accepted { collected: 1, .. }
        ));
    }

    #[test]
    fn test_offer_after_deadline_times_out() {
        let mut collector = ConsensusCollector::default();
        let start = Instant::now();
        collector.start(2, Duration::from_millis(500), start).unwrap();

        match collector.offer(frame(block_hash(0), 0), start + Duration::from_secs(1)) {
            OfferOutcome::Completed(batch) => {
                assert_eq!(batch.completion, Completion::TimedOut);
                assert!(batch.is_empty());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_accepted_frames_stay_diverse(
            hashes in proptest::collection::vec(any::<u64>(), 1..40),
            target in 1usize..8,
        ) {
            let mut collector = ConsensusCollector::default();
            let start = Instant::now();
            collector.start(target, Duration::from_secs(60), start).unwrap();

            let mut delivered = None;
            for (i, word) in hashes.iter().enumerate() {
                let hash = PerceptualHash::from_bits((0..64).map(|b| word & (1 << b) != 0));
                prop_assert!(collector.collected() <= target);
                if let OfferOutcome::Completed(batch) = collector.offer(frame(hash, i as u64), start) {
                    delivered = Some(batch);
                    break;
                }
            }

            if let Some(batch) = delivered {
                prop_assert_eq!(batch.len(), target);
                for (i, a) in batch.frames.iter().enumerate() {
                    for b in &batch.frames[i + 1..] {
                        prop_assert!(hamming(a.hash(), b.hash()).unwrap() >= 12);
                    }
                }
            }
        }
    }
}
