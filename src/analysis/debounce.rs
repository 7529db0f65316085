//! Debounce counter for the ready signal.
//!
//! A single sharp frame is often a fluke. The counter only reports the
//! source as steady after an unbroken run of GOOD ticks, and any other
//! tier drops it back to zero immediately.

use super::threshold::QualityTier;

/// Counts consecutive GOOD observations.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    /// Consecutive GOOD ticks since the last reset or consumption.
    consecutive_good: u32,
    /// Total observations recorded.
    total_observations: u64,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one tick's tier and returns the updated count.
    pub fn record(&mut self, tier: QualityTier) -> u32 {
        self.total_observations += 1;

        if tier == QualityTier::Good {
            self.consecutive_good = self.consecutive_good.saturating_add(1);
        } else {
            if self.consecutive_good > 0 {
                tracing::trace!(
                    streak = self.consecutive_good,
                    %tier,
                    "Good streak broken"
                );
            }
            self.consecutive_good = 0;
        }

        self.consecutive_good
    }

    /// Returns true once the streak has reached `stability` ticks.
    #[inline]
    pub fn is_steady(&self, stability: u32) -> bool {
        self.consecutive_good >= stability
    }

    /// Consumes the streak after a capture fired.
    pub fn consume(&mut self) {
        self.consecutive_good = 0;
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.consecutive_good
    }

    #[inline]
    pub fn total_observations(&self) -> u64 {
        self.total_observations
    }

    /// Resets the debouncer to its initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unsteady() {
        let debouncer = Debouncer::new();
        assert!(!debouncer.is_steady(1));
        assert_eq!(debouncer.count(), 0);
    }

    #[test]
    fn test_becomes_steady_after_streak() {
        let mut debouncer = Debouncer::new();

        assert_eq!(debouncer.record(QualityTier::Good), 1);
        assert!(!debouncer.is_steady(2));

        assert_eq!(debouncer.record(QualityTier::Good), 2);
        assert!(debouncer.is_steady(2));
    }

    #[test]
    fn test_any_other_tier_resets() {
        let mut debouncer = Debouncer::new();
        debouncer.record(QualityTier::Good);
        debouncer.record(QualityTier::Good);

        assert_eq!(debouncer.record(QualityTier::Mid), 0);

        debouncer.record(QualityTier::Good);
        assert_eq!(debouncer.record(QualityTier::Bad), 0);
        assert_eq!(debouncer.total_observations(), 5);
    }

    #[test]
    fn test_consume_clears_streak() {
        let mut debouncer = Debouncer::new();
        for _ in 0..3 {
            debouncer.record(QualityTier::Good);
        }
        debouncer.consume();
        assert_eq!(debouncer.count(), 0);
        assert_eq!(debouncer.record(QualityTier::Good), 1);
    }
}
