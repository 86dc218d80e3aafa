use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{models::bar::Bar, providers::ProviderError};

/// One kline as Binance serializes it: a positional array mixing numbers and
/// decimal strings.
///
/// `[open_time_ms, open, high, low, close, volume, close_time_ms,
///   quote_volume, trade_count, taker_buy_base, taker_buy_quote, ignore]`
#[derive(Debug, Deserialize)]
pub(crate) struct RawKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    #[allow(dead_code)] i64,
    #[allow(dead_code)] String,
    #[allow(dead_code)] u64,
    #[allow(dead_code)] String,
    #[allow(dead_code)] String,
    #[allow(dead_code)] String,
);

fn decimal(field: &str, raw: &str) -> Result<f64, ProviderError> {
    raw.parse::<f64>()
        .map_err(|_| ProviderError::Internal(format!("malformed kline {field}: {raw:?}")))
}

impl RawKline {
    /// Converts the vendor array into the canonical [`Bar`].
    pub(crate) fn into_bar(self) -> Result<Bar, ProviderError> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.0)
            .ok_or_else(|| ProviderError::Internal(format!("kline open time out of range: {}", self.0)))?;
        Ok(Bar {
            timestamp,
            open: decimal("open", &self.1)?,
            high: decimal("high", &self.2)?,
            low: decimal("low", &self.3)?,
            close: decimal("close", &self.4)?,
            volume: Some(decimal("volume", &self.5)?),
        })
    }
}
