//! Vendor-agnostic market data layer for the scanner.
//!
//! Defines the canonical bar/timeframe data model and the [`DataProvider`]
//! trait the signal engine consumes, plus a Binance REST implementation.
//! Nothing in this crate makes trading decisions; it only supplies series.
//!
//! [`DataProvider`]: crate::providers::DataProvider

pub mod models;
pub mod providers;
