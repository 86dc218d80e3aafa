//! The %K/%D/%J oscillator.
//!
//! Derived from the classic stochastic: the raw stochastic value (RSV) places
//! the close inside the trailing high/low range, %K and %D are successive
//! passes of the recursive smoother over it, and %J extrapolates %K beyond %D
//! (`3K − 2D`). %J is deliberately unbounded; readings below 0 or above 100
//! are the exhaustion excursions the scanner triggers on, so no clamping
//! happens anywhere in this module.

use market_data::models::bar::Bar;
use thiserror::Error;

use crate::smoothing::smooth;

/// Neutral RSV used wherever the ratio is undefined (flat window, or the
/// rolling window is not yet full).
pub const NEUTRAL_RSV: f64 = 50.0;

/// Oscillator parameters; the canonical calibration is (9, 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdjParams {
    /// Rolling high/low window, in bars.
    pub period: usize,
    /// Length of each smoothing pass (%K and %D).
    pub smooth: u32,
}

impl Default for KdjParams {
    fn default() -> Self {
        Self { period: 9, smooth: 3 }
    }
}

impl KdjParams {
    /// Minimum bars a series must hold before readings are considered valid:
    /// the rolling window plus one smoothing depth per pass.
    pub fn min_bars(&self) -> usize {
        self.period + 2 * self.smooth as usize
    }
}

/// Errors produced by indicator calculators.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// The input series is too short for the configured windows. No partial
    /// or degenerate numbers are ever returned in this case.
    #[error("insufficient data: need {required} bars, have {actual}")]
    InsufficientData {
        /// Bars required by the configured windows.
        required: usize,
        /// Bars actually supplied.
        actual: usize,
    },
}

/// One oscillator observation, read off the final bar of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KdjReading {
    /// Smoothed stochastic.
    pub k: f64,
    /// Second smoothing pass; the most lagged of the three.
    pub d: f64,
    /// `3K − 2D`, unbounded.
    pub j: f64,
}

/// Parallel %K/%D/%J sequences aligned to the input bar series.
///
/// Live decisions read only [`KdjSeries::last`], but the whole sequence is
/// computed so tests can assert interior values.
#[derive(Debug, Clone, PartialEq)]
pub struct KdjSeries {
    /// %K per input bar.
    pub k: Vec<f64>,
    /// %D per input bar.
    pub d: Vec<f64>,
    /// %J per input bar.
    pub j: Vec<f64>,
}

impl KdjSeries {
    /// The reading on the final bar, if the series is non-empty.
    pub fn last(&self) -> Option<KdjReading> {
        match (self.k.last(), self.d.last(), self.j.last()) {
            (Some(&k), Some(&d), Some(&j)) => Some(KdjReading { k, d, j }),
            _ => None,
        }
    }
}

/// Computes the oscillator for one bar series.
///
/// Fails with [`IndicatorError::InsufficientData`] when fewer than
/// [`KdjParams::min_bars`] bars are supplied, regardless of their content.
/// A flat rolling window (high == low) resolves locally to [`NEUTRAL_RSV`]
/// and is never surfaced as an error.
pub fn kdj(bars: &[Bar], params: &KdjParams) -> Result<KdjSeries, IndicatorError> {
    let required = params.min_bars();
    if bars.len() < required {
        return Err(IndicatorError::InsufficientData {
            required,
            actual: bars.len(),
        });
    }

    let mut rsv = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < params.period {
            rsv.push(NEUTRAL_RSV);
            continue;
        }
        let window = &bars[i + 1 - params.period..=i];
        let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        if high == low {
            rsv.push(NEUTRAL_RSV);
        } else {
            rsv.push(100.0 * (bar.close - low) / (high - low));
        }
    }

    let k = smooth(&rsv, params.smooth, 1);
    let d = smooth(&k, params.smooth, 1);
    let j = k
        .iter()
        .zip(&d)
        .map(|(k, d)| 3.0 * k - 2.0 * d)
        .collect();

    Ok(KdjSeries { k, d, j })
}
