//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is used as the standard output for all
//! [`DataProvider`](crate::providers::DataProvider) implementations and for
//! series derived inside the engine (e.g., aggregated coarse bars).

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::timeframe::Timeframe;

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// Vendor-agnostic and immutable once produced. `volume` is optional because
/// not every venue reports it for every series.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// The timestamp for this bar (UTC, start of the interval).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval, if the venue reports it.
    pub volume: Option<f64>,
}

/// A complete set of time-series data for a single (symbol, timeframe) pair.
///
/// Bars are ordered by time with no duplicate timestamps; [`BarSeries::validate`]
/// checks that invariant on series coming from outside the process.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "AAPL", "BTCUSDT").
    pub symbol: String,
    /// The time interval for each bar in the series.
    pub timeframe: Timeframe,
    /// The collection of OHLCV bars, oldest first.
    pub bars: Vec<Bar>,
}

/// Ordering violations detected by [`BarSeries::validate`].
#[derive(Debug, Error)]
pub enum SeriesError {
    /// A bar's timestamp is earlier than its predecessor's.
    #[error("bar {index} of {symbol} is out of order")]
    OutOfOrder {
        /// Symbol of the offending series.
        symbol: String,
        /// Index of the offending bar.
        index: usize,
    },

    /// Two consecutive bars share a timestamp.
    #[error("bar {index} of {symbol} duplicates the previous timestamp")]
    DuplicateTimestamp {
        /// Symbol of the offending series.
        symbol: String,
        /// Index of the offending bar.
        index: usize,
    },
}

impl BarSeries {
    /// Builds a series from already-ordered bars.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    /// Number of bars in the series.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series holds no bars at all.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recent bar, if any.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Checks the ordered-by-time / no-duplicate-timestamps invariant.
    pub fn validate(&self) -> Result<(), SeriesError> {
        for (index, pair) in self.bars.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.timestamp < prev.timestamp {
                return Err(SeriesError::OutOfOrder {
                    symbol: self.symbol.clone(),
                    index: index + 1,
                });
            }
            if next.timestamp == prev.timestamp {
                return Err(SeriesError::DuplicateTimestamp {
                    symbol: self.symbol.clone(),
                    index: index + 1,
                });
            }
        }
        Ok(())
    }
}
