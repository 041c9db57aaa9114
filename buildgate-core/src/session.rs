//! Playtest session records.
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::numbers::u64_to_f64;

/// One simulated or captured playtest session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: u64,
    pub success: bool,
    pub perfect: bool,
    pub duration_seconds: f64,
    pub restart_count: u32,
    /// Progress fraction reached before failing; 1.0 for a win.
    pub fail_point: f64,
    pub perfect_count: u32,
}

impl SessionRecord {
    /// Perfect outcomes per minute of play, 0 for a zero-length session.
    #[must_use]
    pub fn perfect_per_minute(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            u64_to_f64(u64::from(self.perfect_count)) / self.duration_seconds * 60.0
        } else {
            0.0
        }
    }

    /// Check the record invariants. Externally captured rows go through this
    /// before they reach the aggregator.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] naming the broken invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.perfect && !self.success {
            return Err(PipelineError::invalid(
                "perfect",
                format!("session {} is perfect without a success", self.id),
            ));
        }
        if !self.perfect && self.perfect_count > 0 {
            return Err(PipelineError::invalid(
                "perfect_count",
                format!(
                    "session {} reports {} perfects without a perfect outcome",
                    self.id, self.perfect_count
                ),
            ));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(PipelineError::invalid(
                "duration_seconds",
                format!("session {} has duration {}", self.id, self.duration_seconds),
            ));
        }
        if !(0.0..=1.0).contains(&self.fail_point) {
            return Err(PipelineError::invalid(
                "fail_point",
                format!("session {} has fail point {}", self.id, self.fail_point),
            ));
        }
        if self.success && (self.fail_point - 1.0).abs() > f64::EPSILON {
            return Err(PipelineError::invalid(
                "fail_point",
                format!("session {} won but fail point is {}", self.id, self.fail_point),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(id: u64) -> SessionRecord {
        SessionRecord {
            id,
            success: true,
            perfect: true,
            duration_seconds: 90.0,
            restart_count: 0,
            fail_point: 1.0,
            perfect_count: 3,
        }
    }

    #[test]
    fn perfect_per_minute_scales_by_duration() {
        let record = win(1);
        assert!((record.perfect_per_minute() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_duration_has_no_rate() {
        let record = SessionRecord {
            duration_seconds: 0.0,
            ..win(2)
        };
        assert!(record.perfect_per_minute().abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_perfect_loss() {
        let record = SessionRecord {
            success: false,
            fail_point: 0.5,
            ..win(3)
        };
        let err = record.validate().expect_err("perfect loss");
        assert!(err.to_string().contains("perfect"));
    }

    #[test]
    fn validate_rejects_stray_perfect_count() {
        let record = SessionRecord {
            perfect: false,
            ..win(4)
        };
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_fail_point() {
        let record = SessionRecord {
            success: false,
            perfect: false,
            perfect_count: 0,
            fail_point: 1.4,
            ..win(5)
        };
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_requires_positive_duration() {
        for duration_seconds in [0.0, -3.0, f64::INFINITY] {
            let record = SessionRecord {
                duration_seconds,
                ..win(7)
            };
            let err = record.validate().expect_err("non-positive duration");
            assert!(err.to_string().contains("duration_seconds"));
        }
    }

    #[test]
    fn validate_accepts_plain_loss() {
        let record = SessionRecord {
            success: false,
            perfect: false,
            perfect_count: 0,
            restart_count: 2,
            fail_point: 0.42,
            ..win(6)
        };
        record.validate().expect("valid loss");
    }
}
