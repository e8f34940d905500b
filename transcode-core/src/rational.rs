//! Rational number type for exact time base arithmetic.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// A rational number represented as a numerator and denominator.
///
/// Used for time bases and frame rates. The denominator is always positive;
/// a zero numerator is allowed and marks an unknown tick duration.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rational {
    /// Numerator
    pub num: i64,
    /// Denominator (must be positive)
    pub den: i64,
}

impl Rational {
    /// Create a new rational number, normalising the sign onto the numerator.
    ///
    /// # Panics
    ///
    /// Panics if denominator is zero. Use [`Rational::try_new`] for untrusted input.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "Denominator cannot be zero");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        Self { num, den }
    }

    /// Create a new rational number, rejecting a zero denominator.
    pub fn try_new(num: i64, den: i64) -> Result<Self> {
        if den == 0 {
            return Err(Error::invalid_param(format!(
                "rational {}/{} has a zero denominator",
                num, den
            )));
        }
        Ok(Self::new(num, den))
    }

    /// Create a zero rational.
    pub const fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    /// Check if this rational is zero.
    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Reduce the rational to its simplest form.
    pub fn reduce(&self) -> Self {
        if self.num == 0 {
            return Self { num: 0, den: 1 };
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        Self {
            num: self.num / g as i64,
            den: self.den / g as i64,
        }
    }

    /// Convert to f64. Lossy; only meant for display.
    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Convert to f32. Lossy; only meant for display.
    pub fn to_f32(&self) -> f32 {
        self.num as f32 / self.den as f32
    }

    /// Rescale a value expressed in this base into `target`.
    pub fn rescale_to(&self, value: i64, target: Rational) -> Result<i64> {
        rescale(value, *self, target)
    }
}

/// Rescale `value` from the `from` base into the `to` base.
///
/// Computes `value * from.num * to.den / (from.den * to.num)` with 128-bit
/// intermediates and truncates toward zero. The product of three `i64`
/// factors cannot overflow `i128` for realistic tick counts; the overflow
/// branch only guards the narrowing back to `i64`.
pub fn rescale(value: i64, from: Rational, to: Rational) -> Result<i64> {
    if to.num == 0 {
        return Err(Error::invalid_param(format!(
            "cannot rescale into time base {} with a zero numerator",
            to
        )));
    }
    if from == to {
        return Ok(value);
    }

    let overflow = || Error::Overflow { value, from, to };

    let num = (value as i128)
        .checked_mul(from.num as i128)
        .and_then(|n| n.checked_mul(to.den as i128))
        .ok_or_else(overflow)?;
    let den = (from.den as i128)
        .checked_mul(to.num as i128)
        .ok_or_else(overflow)?;

    i64::try_from(num / den).map_err(|_| overflow())
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({}/{})", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num as i64, den as i64)
    }
}

impl From<(i64, i64)> for Rational {
    fn from((num, den): (i64, i64)) -> Self {
        Self::new(num, den)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_negative_den() {
        let r = Rational::new(1, -2);
        assert_eq!(r.num, -1);
        assert_eq!(r.den, 2);
    }

    #[test]
    fn test_try_new_rejects_zero_den() {
        assert!(Rational::try_new(1, 0).is_err());
        assert_eq!(Rational::try_new(1, 25).unwrap(), Rational::new(1, 25));
    }

    #[test]
    fn test_rational_reduce() {
        let r = Rational::new(3000, 90000).reduce();
        assert_eq!(r, Rational::new(1, 30));
    }

    #[test]
    fn test_rescale_mpeg_to_micros() {
        let mpeg = Rational::new(1, 90000);
        let micros = Rational::new(1, 1_000_000);
        assert_eq!(rescale(90000, mpeg, micros).unwrap(), 1_000_000);
        assert_eq!(rescale(3600, mpeg, micros).unwrap(), 40_000);
    }

    #[test]
    fn test_rescale_truncates_toward_zero() {
        let mpeg = Rational::new(1, 90000);
        let pal = Rational::new(1, 25);
        // 3599 ticks is just under one 1/25 frame
        assert_eq!(rescale(3599, mpeg, pal).unwrap(), 0);
        assert_eq!(rescale(-3599, mpeg, pal).unwrap(), 0);
        assert_eq!(rescale(-3600, mpeg, pal).unwrap(), -1);
    }

    #[test]
    fn test_rescale_identity() {
        let tb = Rational::new(1001, 30000);
        assert_eq!(rescale(i64::MAX, tb, tb).unwrap(), i64::MAX);
    }

    #[test]
    fn test_rescale_overflow() {
        let coarse = Rational::new(1, 1);
        let fine = Rational::new(1, 1_000_000_000);
        let err = rescale(i64::MAX, coarse, fine).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
    }

    #[test]
    fn test_rescale_zero_target_numerator() {
        let err = rescale(1, Rational::new(1, 25), Rational::new(0, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_rational_ord_and_display() {
        assert!(Rational::new(1, 2) > Rational::new(1, 3));
        assert_eq!(Rational::new(1, 25).to_string(), "1/25");
        assert!((Rational::new(1, 4).to_f64() - 0.25).abs() < 1e-10);
    }
}
