use crate::{
    models::timeframe::{Timeframe, TimeframeUnit},
    providers::{BarsRequest, ProviderError},
};

/// Hard cap imposed by the klines endpoint.
const MAX_LIMIT: usize = 1_500;

/// Maps a [`Timeframe`] onto the interval strings Binance accepts.
///
/// Binance supports a fixed menu of intervals; anything else is rejected
/// here rather than bounced by the API mid-scan.
pub(crate) fn interval_str(tf: &Timeframe) -> Result<&'static str, ProviderError> {
    let interval = match (tf.amount().get(), tf.unit()) {
        (1, TimeframeUnit::Minute) => "1m",
        (3, TimeframeUnit::Minute) => "3m",
        (5, TimeframeUnit::Minute) => "5m",
        (15, TimeframeUnit::Minute) => "15m",
        (30, TimeframeUnit::Minute) => "30m",
        (1, TimeframeUnit::Hour) => "1h",
        (2, TimeframeUnit::Hour) => "2h",
        (4, TimeframeUnit::Hour) => "4h",
        (6, TimeframeUnit::Hour) => "6h",
        (8, TimeframeUnit::Hour) => "8h",
        (12, TimeframeUnit::Hour) => "12h",
        (1, TimeframeUnit::Day) => "1d",
        (3, TimeframeUnit::Day) => "3d",
        (1, TimeframeUnit::Week) => "1w",
        (1, TimeframeUnit::Month) => "1M",
        _ => {
            return Err(ProviderError::Validation(format!(
                "Binance does not serve {tf} klines"
            )));
        }
    };
    Ok(interval)
}

/// Builds the query string for one klines request.
pub(crate) fn construct_params(req: &BarsRequest) -> Result<Vec<(String, String)>, ProviderError> {
    let interval = interval_str(&req.timeframe)?;
    let limit = req.limit.clamp(1, MAX_LIMIT);
    Ok(vec![
        ("symbol".to_string(), req.symbol.clone()),
        ("interval".to_string(), interval.to_string()),
        ("limit".to_string(), limit.to_string()),
    ])
}
