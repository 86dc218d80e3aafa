//! Binance USDT-futures klines provider.
//!
//! Market-data endpoints are public; an API key is attached only when
//! `BINANCE_API_KEY` is present in the environment (higher rate limits).

mod params;
mod provider;
mod response;

pub use provider::BinanceProvider;
