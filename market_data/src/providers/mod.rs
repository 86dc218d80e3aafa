//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, a unified interface for
//! fetching time-series bar data from any market data vendor. Each concrete
//! implementation (such as [`binance_rest::BinanceProvider`]) handles
//! vendor-specific API logic and validation behind the same contract.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`dyn DataProvider`) so the scan loop can select a provider at runtime.

pub mod binance_rest;
pub mod errors;

use async_trait::async_trait;

use crate::models::{bar::BarSeries, timeframe::Timeframe};

pub use errors::ProviderError;

/// A request for the most recent bars of one (symbol, timeframe) pair.
///
/// A live scanner always wants "the latest `limit` bars"; providers translate
/// this into whatever range/pagination parameters their API expects.
#[derive(Clone, Debug)]
pub struct BarsRequest {
    /// Vendor symbol to request (e.g., "BTCUSDT").
    pub symbol: String,
    /// The time interval for each bar.
    pub timeframe: Timeframe,
    /// How many trailing bars to return, newest last.
    pub limit: usize,
}

/// Unified interface to a market data vendor.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches the trailing bars for one symbol at one timeframe.
    async fn fetch_bars(&self, req: &BarsRequest) -> Result<BarSeries, ProviderError>;
}
