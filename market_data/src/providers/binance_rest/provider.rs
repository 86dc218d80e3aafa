use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_optional_env_var;

use crate::{
    models::bar::BarSeries,
    providers::{
        BarsRequest, DataProvider, ProviderError,
        binance_rest::{params::construct_params, response::RawKline},
    },
};

const BASE_URL: &str = "https://fapi.binance.com/fapi/v1/klines";

/// Klines provider backed by the Binance futures REST API.
///
/// Requests are paced through a courtesy rate limiter so a large watchlist
/// never hammers the vendor; the limiter blocks the caller, not the engine.
pub struct BinanceProvider {
    client: Client,
    limiter: DefaultDirectRateLimiter,
    base_url: String,
    _api_key: Option<SecretString>,
}

impl BinanceProvider {
    /// Creates a provider pointed at the production endpoint.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(BASE_URL)
    }

    /// Creates a provider against an alternate endpoint (testnet, local stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = get_optional_env_var("BINANCE_API_KEY").map(|k| SecretString::new(k.into()));

        let mut headers = header::HeaderMap::new();
        if let Some(key) = &api_key {
            let mut value = header::HeaderValue::from_str(key.expose_secret())
                .map_err(|e| ProviderError::Validation(format!("invalid BINANCE_API_KEY: {e}")))?;
            value.set_sensitive(true);
            headers.insert("X-MBX-APIKEY", value);
        }

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            // 2 req/s is well under the vendor's weight budget even with an
            // unauthenticated key.
            limiter: RateLimiter::direct(Quota::per_second(nonzero!(2u32))),
            base_url: base_url.into(),
            _api_key: api_key,
        })
    }
}

#[async_trait]
impl DataProvider for BinanceProvider {
    async fn fetch_bars(&self, req: &BarsRequest) -> Result<BarSeries, ProviderError> {
        // Validate the timeframe before spending a request on it.
        let query = construct_params(req)?;

        self.limiter.until_ready().await;

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(ProviderError::Api(error_msg));
        }

        let klines = response.json::<Vec<RawKline>>().await?;
        if klines.is_empty() {
            return Err(ProviderError::Empty {
                symbol: req.symbol.clone(),
            });
        }

        let bars = klines
            .into_iter()
            .map(RawKline::into_bar)
            .collect::<Result<Vec<_>, _>>()?;

        let series = BarSeries::new(req.symbol.clone(), req.timeframe, bars);
        series
            .validate()
            .map_err(|e| ProviderError::Internal(e.to_string()))?;
        Ok(series)
    }
}
