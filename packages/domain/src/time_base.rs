//! Rational time bases and timestamp rescaling.

use std::fmt;
use std::time::Duration;

/// A rational unit of time: one tick lasts `num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBase {
    num: u32,
    den: u32,
}

impl TimeBase {
    /// One tick per microsecond.
    pub const MICROSECONDS: TimeBase = TimeBase {
        num: 1,
        den: 1_000_000,
    };
    /// One tick per millisecond.
    pub const MILLISECONDS: TimeBase = TimeBase {
        num: 1,
        den: 1_000,
    };

    /// Build a time base, rejecting zero terms.
    pub const fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            None
        } else {
            Some(Self { num, den })
        }
    }

    /// `1 / sample_rate`, the natural time base of a PCM stream.
    pub const fn from_sample_rate(sample_rate: u32) -> Option<Self> {
        Self::new(1, sample_rate)
    }

    #[inline]
    pub const fn num(self) -> u32 {
        self.num
    }

    #[inline]
    pub const fn den(self) -> u32 {
        self.den
    }

    /// Re-express `value` ticks of `self` as ticks of `to`.
    ///
    /// Rounds to nearest with ties away from zero; the intermediate product
    /// is computed in 128 bits and saturates at the `i64` range.
    pub fn rescale(self, value: i64, to: TimeBase) -> i64 {
        let num = i128::from(value) * i128::from(self.num) * i128::from(to.den);
        let den = i128::from(self.den) * i128::from(to.num);
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Length of `ticks` ticks; negative values clamp to zero.
    pub fn to_duration(self, ticks: i64) -> Duration {
        let micros = self.rescale(ticks, Self::MICROSECONDS).max(0);
        Duration::from_micros(micros as u64)
    }

    /// Number of ticks closest to `duration`.
    pub fn from_duration(self, duration: Duration) -> i64 {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        Self::MICROSECONDS.rescale(micros, self)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
