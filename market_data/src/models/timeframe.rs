//! Timeframe utilities for expressing uniform bar intervals.
//!
//! A [`Timeframe`] pairs a non-zero amount with a [`TimeframeUnit`], covering
//! minute, hour, day, week, and month bars in UTC. These types give a typed
//! alternative to ad-hoc `(u32, &str)` tuples when building provider requests
//! or wiring per-timeframe threshold rules.
//!
//! The compact display form round-trips through [`FromStr`]:
//! ```
//! use market_data::models::timeframe::Timeframe;
//!
//! let tf: Timeframe = "15m".parse().unwrap();
//! assert_eq!(tf.to_string(), "15m");
//! assert_eq!(tf.fixed_secs(), Some(900));
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use thiserror::Error;

/// Errors constructing or parsing a [`Timeframe`].
#[derive(Debug, Error)]
pub enum TimeframeError {
    /// The amount component was zero.
    #[error("timeframe amount must be non-zero")]
    ZeroAmount,

    /// The input did not match the `<amount><unit>` compact form.
    #[error("unrecognized timeframe: {0:?}")]
    Unparseable(String),
}

/// Timeframe granularity (calendar-aware where needed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeframeUnit {
    /// UTC minute
    Minute,
    /// UTC hour
    Hour,
    /// UTC day
    Day,
    /// Monday-based, UTC
    Week,
    /// calendar months, UTC
    Month,
}

/// A timeframe = amount × unit (e.g., 15-Minute, 4-Hour, 1-Day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeframe {
    amount: NonZeroU32,
    unit: TimeframeUnit,
}

impl Timeframe {
    /// Create a new timeframe from an already-checked amount.
    pub const fn new(amount: NonZeroU32, unit: TimeframeUnit) -> Self {
        Self { amount, unit }
    }

    /// Create a timeframe from raw parts, rejecting a zero amount.
    pub fn from_parts(amount: u32, unit: TimeframeUnit) -> Result<Self, TimeframeError> {
        NonZeroU32::new(amount)
            .map(|amount| Self { amount, unit })
            .ok_or(TimeframeError::ZeroAmount)
    }

    /// `amount`-minute bars.
    pub fn minutes(amount: u32) -> Result<Self, TimeframeError> {
        Self::from_parts(amount, TimeframeUnit::Minute)
    }

    /// `amount`-hour bars.
    pub fn hours(amount: u32) -> Result<Self, TimeframeError> {
        Self::from_parts(amount, TimeframeUnit::Hour)
    }

    /// `amount`-day bars.
    pub fn days(amount: u32) -> Result<Self, TimeframeError> {
        Self::from_parts(amount, TimeframeUnit::Day)
    }

    /// The magnitude component.
    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    /// The unit component.
    pub const fn unit(&self) -> TimeframeUnit {
        self.unit
    }

    /// Width of one bar in seconds, for fixed-width units.
    ///
    /// Weeks and months are calendar-dependent and return `None`; they are
    /// valid fetch timeframes but not aggregation sources or targets.
    pub const fn fixed_secs(&self) -> Option<i64> {
        let amount = self.amount.get() as i64;
        match self.unit {
            TimeframeUnit::Minute => Some(60 * amount),
            TimeframeUnit::Hour => Some(3_600 * amount),
            TimeframeUnit::Day => Some(86_400 * amount),
            TimeframeUnit::Week | TimeframeUnit::Month => None,
        }
    }
}

/// Display/parse for config and CLI ergonomics (`"5m"`, `"1D"`, `"6M"`).
impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.amount.get();
        let u = match self.unit {
            TimeframeUnit::Minute => "m",
            TimeframeUnit::Hour => "h",
            TimeframeUnit::Day => "D",
            TimeframeUnit::Week => "W",
            TimeframeUnit::Month => "M",
        };
        write!(f, "{a}{u}")
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // very small parser: 5m / 3h / 1D / 1W / 6M
        if s.len() < 2 || !s.is_char_boundary(s.len() - 1) {
            return Err(TimeframeError::Unparseable(s.to_string()));
        }
        let (digits, unit) = s.split_at(s.len() - 1);
        let amount: u32 = digits
            .parse()
            .map_err(|_| TimeframeError::Unparseable(s.to_string()))?;
        let unit = match unit {
            "m" => TimeframeUnit::Minute,
            "h" => TimeframeUnit::Hour,
            "D" => TimeframeUnit::Day,
            "W" => TimeframeUnit::Week,
            "M" => TimeframeUnit::Month,
            _ => return Err(TimeframeError::Unparseable(s.to_string())),
        };
        Self::from_parts(amount, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        for text in ["1m", "15m", "1h", "4h", "1D", "1W", "6M"] {
            let tf: Timeframe = text.parse().unwrap();
            assert_eq!(tf.to_string(), text);
        }
    }

    #[test]
    fn zero_amount_rejected() {
        assert!(matches!(
            "0m".parse::<Timeframe>(),
            Err(TimeframeError::ZeroAmount)
        ));
        assert!(matches!(
            Timeframe::minutes(0),
            Err(TimeframeError::ZeroAmount)
        ));
    }

    #[test]
    fn garbage_rejected() {
        for text in ["", "m", "15", "15x", "4H", "h4"] {
            assert!(text.parse::<Timeframe>().is_err(), "{text:?} should not parse");
        }
    }

    #[test]
    fn fixed_widths() {
        assert_eq!(Timeframe::minutes(15).unwrap().fixed_secs(), Some(900));
        assert_eq!(Timeframe::hours(4).unwrap().fixed_secs(), Some(14_400));
        assert_eq!(Timeframe::days(1).unwrap().fixed_secs(), Some(86_400));
        assert_eq!("1W".parse::<Timeframe>().unwrap().fixed_secs(), None);
        assert_eq!("1M".parse::<Timeframe>().unwrap().fixed_secs(), None);
    }
}
