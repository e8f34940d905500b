//! Time bases, timestamps and durations.
//!
//! Every timestamp carries the time base it is expressed in. Conversions are
//! exact rational rescales; the [`NO_TIMESTAMP`] sentinel is never rescaled.

use crate::error::{Error, Result};
use crate::rational::Rational;
use std::fmt;

/// Sentinel tick value meaning "timestamp unknown". Distinct from zero.
pub const NO_TIMESTAMP: i64 = i64::MIN;

/// Internal time base used for session-wide timing state (microseconds).
pub const GLOBAL_TIME_BASE: TimeBase = TimeBase::MICROSECONDS;

/// `value + delta`, failing when the sum overflows or hits [`NO_TIMESTAMP`].
pub fn checked_shift(value: i64, delta: i64) -> Result<i64> {
    match value.checked_add(delta) {
        Some(sum) if sum != NO_TIMESTAMP => Ok(sum),
        _ => Err(Error::OutOfRange { value, delta }),
    }
}

/// A time base: the number of seconds per tick.
///
/// Common time bases:
/// - 1/90000 for MPEG-TS
/// - 1/25 for PAL frame counters
/// - 1/1000000 for the internal clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeBase(pub Rational);

impl TimeBase {
    /// Create a new time base from numerator and denominator.
    pub fn new(num: i64, den: i64) -> Self {
        Self(Rational::new(num, den))
    }

    /// Standard MPEG time base (1/90000).
    pub const MPEG: Self = Self(Rational { num: 1, den: 90000 });

    /// Millisecond time base (1/1000).
    pub const MILLISECONDS: Self = Self(Rational { num: 1, den: 1000 });

    /// Microsecond time base (1/1000000).
    pub const MICROSECONDS: Self = Self(Rational { num: 1, den: 1_000_000 });

    /// Convert a tick count from this time base to another.
    pub fn convert(&self, value: i64, target: TimeBase) -> Result<i64> {
        self.0.rescale_to(value, target.0)
    }

    /// True when the tick duration is unknown (zero numerator).
    pub fn is_unknown(&self) -> bool {
        self.0.num == 0
    }

    /// Convert a tick count to seconds. Lossy; display only.
    pub fn to_seconds(&self, value: i64) -> f64 {
        value as f64 * self.0.to_f64()
    }

    /// Get the time base as a rational.
    pub fn as_rational(&self) -> Rational {
        self.0
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        GLOBAL_TIME_BASE
    }
}

impl From<(i32, i32)> for TimeBase {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num as i64, den as i64)
    }
}

impl From<Rational> for TimeBase {
    fn from(r: Rational) -> Self {
        Self(r)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A timestamp with an associated time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// The raw tick value, or [`NO_TIMESTAMP`].
    pub value: i64,
    /// The time base for interpreting the value.
    pub time_base: TimeBase,
}

impl Timestamp {
    /// Value representing an undefined timestamp.
    pub const NONE: i64 = NO_TIMESTAMP;

    /// Create a new timestamp.
    pub fn new(value: i64, time_base: TimeBase) -> Self {
        Self { value, time_base }
    }

    /// Create an undefined timestamp in the given base.
    pub fn none_in(time_base: TimeBase) -> Self {
        Self {
            value: Self::NONE,
            time_base,
        }
    }

    /// Create an undefined timestamp.
    pub fn none() -> Self {
        Self::none_in(TimeBase::default())
    }

    /// Check if this timestamp is defined.
    pub fn is_valid(&self) -> bool {
        self.value != Self::NONE
    }

    /// Convert to a different time base. An undefined timestamp stays undefined.
    pub fn rescale(&self, target: TimeBase) -> Result<Self> {
        if !self.is_valid() {
            return Ok(Self::none_in(target));
        }
        Ok(Self {
            value: self.time_base.convert(self.value, target)?,
            time_base: target,
        })
    }

    /// Add `delta` ticks if the timestamp is defined.
    ///
    /// Fails without changing the value when the result leaves the valid range.
    pub fn shift(&mut self, delta: i64) -> Result<()> {
        if !self.is_valid() {
            return Ok(());
        }
        self.value = checked_shift(self.value, delta)?;
        Ok(())
    }

    /// Convert to seconds.
    pub fn to_seconds(&self) -> Option<f64> {
        self.is_valid().then(|| self.time_base.to_seconds(self.value))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(secs) = self.to_seconds() {
            let sign = if secs < 0.0 { "-" } else { "" };
            let secs = secs.abs();
            let hours = (secs / 3600.0) as u32;
            let mins = ((secs % 3600.0) / 60.0) as u32;
            let secs = secs % 60.0;
            write!(f, "{}{:02}:{:02}:{:06.3}", sign, hours, mins, secs)
        } else {
            write!(f, "NONE")
        }
    }
}

/// A duration with an associated time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    /// The raw duration value.
    pub value: i64,
    /// The time base for interpreting the value.
    pub time_base: TimeBase,
}

impl Duration {
    /// Create a new duration.
    pub fn new(value: i64, time_base: TimeBase) -> Self {
        Self { value, time_base }
    }

    /// Create a zero duration in the given base.
    pub fn zero_in(time_base: TimeBase) -> Self {
        Self {
            value: 0,
            time_base,
        }
    }

    /// Check if this duration is zero.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Convert to a different time base.
    pub fn rescale(&self, target: TimeBase) -> Result<Self> {
        Ok(Self {
            value: self.time_base.convert(self.value, target)?,
            time_base: target,
        })
    }

    /// Convert to seconds.
    pub fn to_seconds(&self) -> f64 {
        self.time_base.to_seconds(self.value)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::zero_in(TimeBase::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_base_convert() {
        let ms = TimeBase::MILLISECONDS;
        assert_eq!(ms.convert(1000, TimeBase::MPEG).unwrap(), 90000);
    }

    #[test]
    fn test_none_is_not_rescaled() {
        let ts = Timestamp::none_in(TimeBase::MPEG);
        let rescaled = ts.rescale(TimeBase::new(1, 25)).unwrap();
        assert_eq!(rescaled.value, NO_TIMESTAMP);
        assert_eq!(rescaled.time_base, TimeBase::new(1, 25));
    }

    #[test]
    fn test_shift_skips_none() {
        let mut ts = Timestamp::none_in(TimeBase::MPEG);
        ts.shift(100).unwrap();
        assert!(!ts.is_valid());

        let mut ts = Timestamp::new(10, TimeBase::MPEG);
        ts.shift(-4).unwrap();
        assert_eq!(ts.value, 6);
    }

    #[test]
    fn test_shift_out_of_range() {
        let mut ts = Timestamp::new(i64::MAX - 1, TimeBase::MPEG);
        assert!(matches!(
            ts.shift(10),
            Err(Error::OutOfRange { value, delta: 10 }) if value == i64::MAX - 1
        ));
        assert_eq!(ts.value, i64::MAX - 1);

        // Landing on the sentinel would turn a real timestamp into NONE
        let mut ts = Timestamp::new(i64::MIN + 5, TimeBase::MPEG);
        assert!(ts.shift(-5).is_err());
        assert!(ts.is_valid());
    }

    #[test]
    fn test_checked_shift() {
        assert_eq!(checked_shift(-20_000_000, 40_000).unwrap(), -19_960_000);
        assert!(checked_shift(i64::MIN + 1, -2).is_err());
    }

    #[test]
    fn test_unknown_base() {
        assert!(TimeBase::new(0, 1).is_unknown());
        assert!(!TimeBase::MPEG.is_unknown());
    }

    #[test]
    fn test_duration_rescale() {
        let d = Duration::new(90000 * 120, TimeBase::MPEG);
        let out = d.rescale(TimeBase::new(1, 25)).unwrap();
        assert_eq!(out.value, 3000);
    }

    #[test]
    fn test_timestamp_display() {
        let ts = Timestamp::new(3723500, TimeBase::MILLISECONDS);
        assert_eq!(format!("{}", ts), "01:02:03.500");
        assert_eq!(format!("{}", Timestamp::none()), "NONE");
    }
}
