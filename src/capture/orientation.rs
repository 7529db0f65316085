//! Best-effort device orientation input.
//!
//! Orientation is auxiliary metadata only. Captures carry the latest
//! reading when a sampler is attached; nothing depends on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device orientation in degrees, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationReading {
    /// Rotation around the z axis.
    pub alpha: f64,
    /// Front-to-back tilt.
    pub beta: f64,
    /// Left-to-right tilt.
    pub gamma: f64,
    pub timestamp: DateTime<Utc>,
}

impl OrientationReading {
    /// Largest per-axis angular difference to `other`, in degrees.
    ///
    /// Alpha wraps at 360.
    pub fn max_delta(&self, other: &OrientationReading) -> f64 {
        let alpha = (self.alpha - other.alpha).abs() % 360.0;
        let alpha = alpha.min(360.0 - alpha);
        alpha
            .max((self.beta - other.beta).abs())
            .max((self.gamma - other.gamma).abs())
    }
}

/// Source of orientation readings.
pub trait OrientationSampler: Send {
    /// Most recent reading, if any has arrived.
    fn latest(&self) -> Option<OrientationReading>;
}

/// Sampler that always reports the same reading.
#[derive(Debug, Clone)]
pub struct FixedOrientation(pub OrientationReading);

impl OrientationSampler for FixedOrientation {
    fn latest(&self) -> Option<OrientationReading> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(alpha: f64, beta: f64, gamma: f64) -> OrientationReading {
        OrientationReading {
            alpha,
            beta,
            gamma,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_alpha_wraps() {
        let a = reading(355.0, 0.0, 0.0);
        let b = reading(5.0, 0.0, 0.0);
        assert!((a.max_delta(&b) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_largest_axis_wins() {
        let a = reading(0.0, 10.0, -20.0);
        let b = reading(1.0, 12.0, 5.0);
        assert!((a.max_delta(&b) - 25.0).abs() < 1e-9);
    }
}
