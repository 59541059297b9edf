//! Playback-speed calculation for synthesized utterances.

use crate::error::{DubError, Result};

pub const DEFAULT_MIN_SPEED: f64 = 1.0;
pub const DEFAULT_MAX_SPEED: f64 = 1.4;

/// Inclusive bounds for the time-stretch ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedBounds {
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for SpeedBounds {
    fn default() -> Self {
        Self {
            min_speed: DEFAULT_MIN_SPEED,
            max_speed: DEFAULT_MAX_SPEED,
        }
    }
}

impl SpeedBounds {
    pub fn new(min_speed: f64, max_speed: f64) -> Self {
        Self {
            min_speed,
            max_speed,
        }
    }

    /// Speed that makes `remote_secs` of speech fit in `available_secs`.
    ///
    /// Without usable durations the slowest allowed speed is returned.
    pub fn speed_for(&self, remote_secs: f64, available_secs: f64) -> f64 {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(remote_secs) || !usable(available_secs) {
            return self.min_speed;
        }
        // Not `clamp`: inverted bounds must not panic.
        (remote_secs / available_secs)
            .max(self.min_speed)
            .min(self.max_speed)
    }
}

/// Reject speeds the time-stretcher cannot apply.
pub fn validate_speed(speed: f64) -> Result<f64> {
    if speed.is_nan() || speed <= 0.0 {
        return Err(DubError::InvalidSpeed(speed));
    }
    Ok(speed)
}
