//! Rolling mean ± k·σ volatility bands.
//!
//! Context only: a band reading annotates the alert message with how far the
//! trigger price sits from the band, it never gates a decision.

use market_data::models::bar::Bar;

/// Band parameters; the conventional calibration is (20, 2.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandParams {
    /// Rolling window over closes, in bars.
    pub period: usize,
    /// Multiplier applied to the population standard deviation.
    pub std_mult: f64,
}

impl Default for BandParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_mult: 2.0,
        }
    }
}

/// One band observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// mean + mult·σ
    pub upper: f64,
    /// mean − mult·σ
    pub lower: f64,
}

/// Computes the band per input bar; `None` until `period` bars are available.
pub fn bollinger(bars: &[Bar], params: &BandParams) -> Vec<Option<Band>> {
    bars.iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < params.period {
                return None;
            }
            let window = &bars[i + 1 - params.period..=i];
            let len = window.len() as f64;
            let mean = window.iter().map(|b| b.close).sum::<f64>() / len;
            let variance = window
                .iter()
                .map(|b| (b.close - mean).powi(2))
                .sum::<f64>()
                / len;
            let std = variance.sqrt();
            Some(Band {
                upper: mean + params.std_mult * std,
                lower: mean - params.std_mult * std,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: None,
            })
            .collect()
    }

    #[test]
    fn undefined_until_window_fills() {
        let bars = bars_from_closes(&[1.0; 25]);
        let bands = bollinger(&bars, &BandParams::default());
        assert_eq!(bands.len(), 25);
        assert!(bands[..19].iter().all(Option::is_none));
        assert!(bands[19..].iter().all(Option::is_some));
    }

    #[test]
    fn hand_checked_window() {
        // Two-bar window over [2, 4]: mean 3, population σ 1.
        let bars = bars_from_closes(&[2.0, 4.0]);
        let params = BandParams {
            period: 2,
            std_mult: 2.0,
        };
        let band = bollinger(&bars, &params)[1].unwrap();
        assert!((band.upper - 5.0).abs() < 1e-12);
        assert!((band.lower - 1.0).abs() < 1e-12);
    }

    #[test]
    fn flat_closes_collapse_the_band() {
        let bars = bars_from_closes(&[7.0; 30]);
        let band = bollinger(&bars, &BandParams::default())
            .last()
            .copied()
            .flatten()
            .unwrap();
        assert_eq!(band.upper, 7.0);
        assert_eq!(band.lower, 7.0);
    }
}
