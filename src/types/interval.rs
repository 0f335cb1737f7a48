//! Exact gap-to-car-ahead values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Time gap from a driver to the car immediately ahead, in whole milliseconds.
///
/// The feed publishes intervals as strings with millisecond precision (`"+0.687"`).
/// Keeping them as integers makes snapshot comparison exact, which the resync
/// search relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Interval(u32);

/// Error returned when a string is not a numeric interval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a numeric interval")]
pub struct InvalidInterval(pub String);

impl Interval {
    /// Create from whole milliseconds
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Create from seconds, rounding to the nearest millisecond.
    /// Negative and non-finite values clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self(0);
        }
        Self((secs * 1000.0).round().min(u32::MAX as f64) as u32)
    }

    /// Whole milliseconds
    pub fn as_millis(self) -> u32 {
        self.0
    }

    /// Seconds as a float
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Parse a wire value such as `"+0.687"` or `"21.395"`.
    ///
    /// Returns `None` for the non-numeric forms the feed uses for the leader and
    /// lapped cars (`""`, `"1L"`, `"LAP 52"`).
    pub fn parse_wire(value: &str) -> Option<Self> {
        let digits = value.trim();
        let digits = digits.strip_prefix('+').unwrap_or(digits);
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty()
            || fraction.len() > 3
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let seconds: u32 = whole.parse().ok()?;
        let mut millis = 0u32;
        for (i, digit) in fraction.bytes().enumerate() {
            millis += (digit - b'0') as u32 * 10u32.pow(2 - i as u32);
        }

        seconds.checked_mul(1000)?.checked_add(millis).map(Self)
    }
}

impl FromStr for Interval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_wire(s).ok_or_else(|| InvalidInterval(s.to_string()))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_intervals_exactly() {
        assert_eq!(Interval::parse_wire("+0.687"), Some(Interval::from_millis(687)));
        assert_eq!(Interval::parse_wire("+21.395"), Some(Interval::from_millis(21_395)));
        assert_eq!(Interval::parse_wire("1.2"), Some(Interval::from_millis(1_200)));
        assert_eq!(Interval::parse_wire("+3"), Some(Interval::from_millis(3_000)));
    }

    #[test]
    fn non_numeric_intervals_are_rejected() {
        for value in ["", "+", "1L", "LAP 52", "+1.2345", "-0.5", "+.5"] {
            assert_eq!(Interval::parse_wire(value), None, "{value:?} should not parse");
        }
        assert!("LAP 3".parse::<Interval>().is_err());
    }

    #[test]
    fn float_construction_matches_wire_parse() {
        assert_eq!(Interval::from_secs_f64(0.687), Interval::parse_wire("+0.687").unwrap());
        assert_eq!(Interval::from_secs_f64(21.395), Interval::parse_wire("+21.395").unwrap());
        assert_eq!(Interval::from_secs_f64(-1.0), Interval::from_millis(0));
    }

    #[test]
    fn displays_in_wire_form() {
        assert_eq!(Interval::from_millis(504).to_string(), "+0.504");
        assert_eq!(Interval::from_millis(21_395).to_string(), "+21.395");
    }
}
