//! The one-shot signal record and the delivery seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_data::models::timeframe::Timeframe;
use thiserror::Error;

use crate::{
    confluence::{Direction, SignalKind},
    oscillator::KdjReading,
};

/// An oscillator reading tagged with the timeframe it was taken on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeReading {
    /// Timeframe the reading belongs to.
    pub timeframe: Timeframe,
    /// The reading off that timeframe's final bar.
    pub reading: KdjReading,
}

/// Where the trigger price sits relative to the volatility band on the
/// signal's side (lower band for buys, upper for sells). Message context
/// only, never a gating input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandContext {
    /// The band edge the price is compared against.
    pub reference: f64,
    /// Signed distance from the reference, in percent of the reference.
    pub distance_pct: f64,
    /// Whether the price has already pushed through the band edge.
    pub breached: bool,
}

/// Immutable output of a firing decision.
///
/// Ownership transfers to the [`SignalSink`]; the engine keeps a copy only
/// inside the cycle report.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Vendor ticker the signal is for.
    pub symbol: String,
    /// Human-readable instrument name from the configuration.
    pub display_name: String,
    /// What the decision means (new entry / average down / take profit / short).
    pub kind: SignalKind,
    /// Close of the reference timeframe when the signal fired.
    pub price: f64,
    /// One oscillator reading per configured timeframe, in rule order.
    pub readings: Vec<TimeframeReading>,
    /// Optional volatility-band annotation.
    pub band: Option<BandContext>,
    /// When the decision was made.
    pub fired_at: DateTime<Utc>,
}

impl Signal {
    /// Trade direction, derived from the kind.
    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }
}

/// A delivery attempt failed. Sinks flatten their transport errors into this;
/// the scan loop logs it and moves on, since delivery failures never stop a
/// scan.
#[derive(Debug, Error)]
#[error("signal delivery failed: {0}")]
pub struct SinkError(
    /// Flattened transport error.
    pub String,
);

/// Delivery seam for fired signals (Telegram, log file, test collector).
#[async_trait]
pub trait SignalSink: Send + Sync {
    /// Hands one signal over for delivery.
    async fn deliver(&self, signal: &Signal) -> Result<(), SinkError>;
}
