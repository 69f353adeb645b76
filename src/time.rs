//! Simulated time for the kernel.
//!
//! [`Time`] is a totally-ordered scalar over the non-negative reals plus a
//! distinguished `infinity` sentinel meaning "never". All scheduling in the
//! kernel is expressed in this domain: a model whose time advance is
//! [`Time::INFINITY`] will not fire spontaneously.
//!
//! Arithmetic rules:
//! - Addition absorbs toward infinity: `finite + infinity = infinity`,
//!   `infinity + infinity = infinity`.
//! - Subtraction of an infinite operand is an error
//!   ([`SimError::InvalidTimeArithmetic`]): a dynamics implementation that
//!   computes a delay from infinity is buggy, and the kernel surfaces that
//!   immediately instead of propagating a meaningless value.
//! - `infinity - finite = infinity`.
//!
//! Ordering treats infinity as strictly greater than every finite value and
//! equal only to itself. Equality on finite values is exact (no epsilon):
//! tie-break grouping in the scheduler depends on it.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign};

use crate::error::{SimError, SimResult};

/// A point in (or duration of) simulated time.
#[derive(Clone, Copy, Debug)]
pub struct Time(f64);

impl Time {
    /// The origin of simulated time.
    pub const ZERO: Time = Time(0.0);

    /// The "never" sentinel. Greater than every finite time.
    pub const INFINITY: Time = Time(f64::INFINITY);

    /// Creates a finite time value.
    ///
    /// # Panics
    /// Panics if `value` is NaN. NaN is outside the time domain and would
    /// silently break the total order every scheduler operation relies on.
    pub fn new(value: f64) -> Self {
        assert!(!value.is_nan(), "Time cannot be NaN");
        Time(value)
    }

    /// Returns `true` if this is the infinity sentinel.
    pub fn is_infinity(self) -> bool {
        self.0.is_infinite()
    }

    /// Returns `true` if this is a finite value.
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Returns the raw value. Infinity maps to `f64::INFINITY`.
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Subtracts `other` from `self`.
    ///
    /// Fails with [`SimError::InvalidTimeArithmetic`] when `other` is
    /// infinite (this covers both `infinity - infinity` and
    /// `finite - infinity`). `infinity - finite` stays infinity.
    pub fn checked_sub(self, other: Time) -> SimResult<Time> {
        if other.is_infinity() {
            return Err(SimError::InvalidTimeArithmetic(
                "cannot subtract an infinite time".to_string(),
            ));
        }
        if self.is_infinity() {
            return Ok(Time::INFINITY);
        }
        Ok(Time(self.0 - other.0))
    }
}

impl Add for Time {
    type Output = Time;

    /// Addition absorbs toward infinity.
    fn add(self, rhs: Time) -> Time {
        if self.is_infinity() || rhs.is_infinity() {
            Time::INFINITY
        } else {
            Time(self.0 + rhs.0)
        }
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        *self = *self + rhs;
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_infinity(), other.is_infinity()) {
            (true, true) => true,
            (false, false) => self.0 == other.0,
            _ => false,
        }
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_infinity(), other.is_infinity()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            // NaN is excluded at construction, so this never fails.
            (false, false) => self.0.partial_cmp(&other.0).expect("Time is never NaN"),
        }
    }
}

impl From<f64> for Time {
    fn from(value: f64) -> Self {
        Time::new(value)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinity() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_finite() {
        assert!(Time::new(1.0) < Time::new(2.0));
        assert!(Time::new(2.0) > Time::new(1.0));
        assert!(Time::new(3.0) <= Time::new(3.0));
        assert_eq!(Time::new(5.0), Time::new(5.0));
        assert_ne!(Time::new(5.0), Time::new(5.5));
    }

    #[test]
    fn test_infinity_greater_than_every_finite() {
        assert!(Time::new(0.0) < Time::INFINITY);
        assert!(Time::new(1e300) < Time::INFINITY);
        assert!(Time::INFINITY > Time::new(f64::MAX));
    }

    #[test]
    fn test_infinity_equal_only_to_itself() {
        assert_eq!(Time::INFINITY, Time::INFINITY);
        assert_ne!(Time::INFINITY, Time::new(0.0));
        assert_ne!(Time::new(0.0), Time::INFINITY);
    }

    #[test]
    fn test_addition_absorbs_infinity() {
        assert_eq!(Time::new(1.0) + Time::new(2.0), Time::new(3.0));
        assert_eq!(Time::new(1.0) + Time::INFINITY, Time::INFINITY);
        assert_eq!(Time::INFINITY + Time::new(1.0), Time::INFINITY);
        assert_eq!(Time::INFINITY + Time::INFINITY, Time::INFINITY);
    }

    #[test]
    fn test_subtraction() {
        assert_eq!(
            Time::new(5.0).checked_sub(Time::new(2.0)).unwrap(),
            Time::new(3.0)
        );
        assert_eq!(
            Time::INFINITY.checked_sub(Time::new(2.0)).unwrap(),
            Time::INFINITY
        );
    }

    #[test]
    fn test_subtracting_infinity_fails() {
        assert!(Time::new(5.0).checked_sub(Time::INFINITY).is_err());
        assert!(Time::INFINITY.checked_sub(Time::INFINITY).is_err());
    }

    #[test]
    #[should_panic(expected = "Time cannot be NaN")]
    fn test_nan_rejected() {
        let _ = Time::new(f64::NAN);
    }

    #[test]
    fn test_display() {
        assert_eq!(Time::new(2.5).to_string(), "2.5");
        assert_eq!(Time::INFINITY.to_string(), "inf");
    }
}
