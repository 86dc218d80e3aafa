//! Multi-timeframe KDJ signal engine.
//!
//! Everything with algorithmic content lives here: the recursive smoother,
//! the %K/%D/%J oscillator, clock-aligned bar aggregation, volatility bands,
//! the confluence evaluator and the per-symbol cooldown gate, tied together
//! by [`scan::run_cycle`]. Market data access and alert delivery stay behind
//! traits so every piece is testable with synthetic series and clocks.

#![deny(missing_docs)]

pub mod aggregate;
pub mod bands;
pub mod config;
pub mod confluence;
pub mod cooldown;
pub mod oscillator;
pub mod scan;
pub mod session;
pub mod signal;
pub mod smoothing;
