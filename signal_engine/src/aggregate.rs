//! Derives a coarser bar series from a finer one.
//!
//! - Buckets are fixed-duration and aligned to absolute clock boundaries
//!   relative to the Unix epoch, NOT to the first sample: the same cut a
//!   venue would make for its own candles.
//! - Empty buckets are dropped, producing gaps rather than interpolated bars.
//! - The trailing bucket is withheld until its full span has elapsed, so an
//!   in-progress coarse candle never reaches the oscillator.
//!
//! The aggregation is pure and stateless: the same fine series always yields
//! the same coarse series.

use chrono::{DateTime, Utc};
use market_data::models::{
    bar::{Bar, BarSeries},
    timeframe::Timeframe,
};
use thiserror::Error;

/// Errors raised when an aggregation target is malformed.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The unit has no fixed width (weeks, months) and cannot be bucketed.
    #[error("{0} is not a fixed-width timeframe")]
    NotFixedWidth(
        /// The offending timeframe.
        Timeframe,
    ),

    /// The target width is not a whole multiple of the source width.
    #[error("{target} is not a whole multiple of {src}")]
    NotAMultiple {
        /// Width of the input series.
        src: Timeframe,
        /// Requested output width.
        target: Timeframe,
    },
}

fn bucket_id(ts: DateTime<Utc>, width_secs: i64) -> i64 {
    ts.timestamp().div_euclid(width_secs)
}

fn bucket_start(id: i64, width_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(id * width_secs, 0).expect("bucket start within datetime range")
}

fn merge_volume(acc: Option<f64>, next: Option<f64>) -> Option<f64> {
    match (acc, next) {
        (Some(a), Some(b)) => Some(a + b),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Reduces a fine series into `target`-width bars.
///
/// Per bucket: open = first constituent's open, high = max of highs,
/// low = min of lows, close = last constituent's close, volume = sum of the
/// volumes that exist. Input bars must be ordered by time (see
/// [`BarSeries::validate`]).
pub fn aggregate(series: &BarSeries, target: Timeframe) -> Result<BarSeries, AggregateError> {
    let fine_secs = series
        .timeframe
        .fixed_secs()
        .ok_or(AggregateError::NotFixedWidth(series.timeframe))?;
    let coarse_secs = target
        .fixed_secs()
        .ok_or(AggregateError::NotFixedWidth(target))?;
    if coarse_secs < fine_secs || coarse_secs % fine_secs != 0 {
        return Err(AggregateError::NotAMultiple {
            src: series.timeframe,
            target,
        });
    }

    let mut out: Vec<Bar> = Vec::new();
    let mut current: Option<(i64, Bar)> = None;

    for bar in &series.bars {
        let id = bucket_id(bar.timestamp, coarse_secs);
        match &mut current {
            Some((open_id, acc)) if *open_id == id => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume = merge_volume(acc.volume, bar.volume);
            }
            _ => {
                if let Some((_, done)) = current.take() {
                    out.push(done);
                }
                current = Some((
                    id,
                    Bar {
                        timestamp: bucket_start(id, coarse_secs),
                        open: bar.open,
                        high: bar.high,
                        low: bar.low,
                        close: bar.close,
                        volume: bar.volume,
                    },
                ));
            }
        }
    }

    // The trailing bucket only counts once its span has fully elapsed.
    if let Some((id, done)) = current {
        let bucket_end = (id + 1) * coarse_secs;
        if let Some(last) = series.bars.last() {
            let series_end = last.timestamp.timestamp() + fine_secs;
            if bucket_end <= series_end {
                out.push(done);
            }
        }
    }

    Ok(BarSeries::new(series.symbol.clone(), target, out))
}
