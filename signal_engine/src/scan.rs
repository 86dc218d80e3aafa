//! One scan cycle over the configured universe.
//!
//! Symbols are evaluated sequentially and in isolation: nothing a symbol does
//! can abort the scan of the rest. The only mutable state is the cooldown
//! gate, held exclusively for the cycle, and it is touched exactly once per
//! firing decision, so an abandoned cycle (shutdown mid-scan) always leaves
//! consistent state behind.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use market_data::{
    models::{bar::BarSeries, timeframe::Timeframe},
    providers::{BarsRequest, DataProvider},
};
use tracing::{debug, info, warn};

use crate::{
    aggregate::aggregate,
    bands::{Band, bollinger},
    config::{ScannerConfig, SymbolDescriptor, TimeframeSource},
    confluence::{ConfluenceEvaluator, Direction},
    cooldown::CooldownGate,
    oscillator::kdj,
    signal::{BandContext, Signal, SignalSink, TimeframeReading},
};

/// Why a symbol produced no evaluation this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The symbol fired recently and its quiet window has not elapsed.
    Cooldown,
    /// A series was too short for the configured windows.
    InsufficientData {
        /// The timeframe that came up short.
        timeframe: Timeframe,
    },
    /// The provider could not supply a series. Treated exactly like
    /// insufficient data: skip, no signal, no cooldown update.
    Fetch {
        /// Collaborator error, flattened for the report.
        message: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Cooldown => write!(f, "cooldown"),
            SkipReason::InsufficientData { timeframe } => {
                write!(f, "insufficient data on {timeframe}")
            }
            SkipReason::Fetch { message } => write!(f, "fetch failed: {message}"),
        }
    }
}

/// One skipped symbol with its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSkip {
    /// The skipped ticker.
    pub ticker: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// What one cycle did, for operators and tests.
#[derive(Debug)]
pub struct CycleReport {
    /// When the cycle started (also the decision timestamp for every symbol).
    pub started_at: DateTime<Utc>,
    /// Symbols that ran the full pipeline, whether or not they fired.
    pub evaluated: usize,
    /// Signals fired this cycle, in universe order.
    pub signals: Vec<Signal>,
    /// Symbols skipped, with reasons.
    pub skips: Vec<SymbolSkip>,
}

/// Runs one full scan cycle against an immutable configuration snapshot.
///
/// Per symbol: cooldown check → fetch each source timeframe → derive
/// aggregated timeframes → oscillator per timeframe → confluence decision →
/// on fire, record the cooldown and hand the signal to the sink. A sink
/// failure is logged and swallowed; the signal still counts as fired and the
/// cooldown stands: the decision happened, delivery is best-effort.
pub async fn run_cycle(
    provider: &dyn DataProvider,
    sink: &dyn SignalSink,
    config: &ScannerConfig,
    gate: &mut CooldownGate,
    now: DateTime<Utc>,
) -> CycleReport {
    let evaluator = config.evaluator();
    let mut report = CycleReport {
        started_at: now,
        evaluated: 0,
        signals: Vec::new(),
        skips: Vec::new(),
    };

    for symbol in &config.symbols {
        if !gate.should_evaluate(&symbol.ticker, now) {
            debug!(ticker = %symbol.ticker, "under cooldown, skipped");
            report.skips.push(SymbolSkip {
                ticker: symbol.ticker.clone(),
                reason: SkipReason::Cooldown,
            });
            continue;
        }

        match evaluate_symbol(provider, config, &evaluator, symbol, now).await {
            Ok(decision) => {
                report.evaluated += 1;
                if let Some(signal) = decision {
                    info!(
                        ticker = %signal.symbol,
                        kind = ?signal.kind,
                        price = signal.price,
                        "signal fired"
                    );
                    gate.record_fired(&symbol.ticker, now);
                    if let Err(e) = sink.deliver(&signal).await {
                        warn!(ticker = %signal.symbol, error = %e, "delivery failed");
                    }
                    report.signals.push(signal);
                }
            }
            Err(reason) => {
                debug!(ticker = %symbol.ticker, reason = %reason, "skipped");
                report.skips.push(SymbolSkip {
                    ticker: symbol.ticker.clone(),
                    reason,
                });
            }
        }
    }

    info!(
        evaluated = report.evaluated,
        signals = report.signals.len(),
        skips = report.skips.len(),
        "cycle finished"
    );
    report
}

/// Fetches a source series once per cycle, caching it for reuse across plans.
async fn source_series<'c>(
    provider: &dyn DataProvider,
    cache: &'c mut IndexMap<Timeframe, BarSeries>,
    ticker: &str,
    timeframe: Timeframe,
    limit: usize,
) -> Result<&'c BarSeries, SkipReason> {
    if !cache.contains_key(&timeframe) {
        let req = BarsRequest {
            symbol: ticker.to_string(),
            timeframe,
            limit,
        };
        let series = provider.fetch_bars(&req).await.map_err(|e| SkipReason::Fetch {
            message: e.to_string(),
        })?;
        series.validate().map_err(|e| SkipReason::Fetch {
            message: e.to_string(),
        })?;
        cache.insert(timeframe, series);
    }
    Ok(&cache[&timeframe])
}

async fn evaluate_symbol(
    provider: &dyn DataProvider,
    config: &ScannerConfig,
    evaluator: &ConfluenceEvaluator,
    symbol: &SymbolDescriptor,
    now: DateTime<Utc>,
) -> Result<Option<Signal>, SkipReason> {
    let Some(first_plan) = config.plans.first() else {
        return Ok(None);
    };

    let mut cache: IndexMap<Timeframe, BarSeries> = IndexMap::new();
    let mut readings = Vec::with_capacity(config.plans.len());
    let mut tagged = Vec::with_capacity(config.plans.len());
    let mut price: Option<f64> = None;
    let mut band: Option<Band> = None;

    for plan in &config.plans {
        let series = match plan.source {
            TimeframeSource::Fetched => source_series(
                provider,
                &mut cache,
                &symbol.ticker,
                plan.rule.timeframe,
                config.history_bars,
            )
            .await?
            .clone(),
            TimeframeSource::Derived { from } => {
                let fine = source_series(
                    provider,
                    &mut cache,
                    &symbol.ticker,
                    from,
                    config.history_bars,
                )
                .await?;
                aggregate(fine, plan.rule.timeframe).map_err(|e| SkipReason::Fetch {
                    message: e.to_string(),
                })?
            }
        };

        let kdj_series = kdj(&series.bars, &config.kdj).map_err(|_| {
            SkipReason::InsufficientData {
                timeframe: plan.rule.timeframe,
            }
        })?;
        let reading = kdj_series
            .last()
            .ok_or(SkipReason::InsufficientData {
                timeframe: plan.rule.timeframe,
            })?;

        if price.is_none() {
            price = series.last().map(|b| b.close);
        }
        if let Some(band_plan) = &config.bands {
            if band_plan.timeframe == plan.rule.timeframe {
                band = bollinger(&series.bars, &band_plan.params)
                    .last()
                    .copied()
                    .flatten();
            }
        }

        readings.push(reading);
        tagged.push(TimeframeReading {
            timeframe: plan.rule.timeframe,
            reading,
        });
    }

    let price = price.ok_or(SkipReason::InsufficientData {
        timeframe: first_plan.rule.timeframe,
    })?;

    let Some(kind) = evaluator.evaluate(symbol.held, &readings) else {
        return Ok(None);
    };

    let band_context = band.map(|b| {
        let reference = match kind.direction() {
            Direction::Buy => b.lower,
            Direction::Sell => b.upper,
        };
        let breached = match kind.direction() {
            Direction::Buy => price < b.lower,
            Direction::Sell => price > b.upper,
        };
        BandContext {
            reference,
            distance_pct: (price - reference) / reference * 100.0,
            breached,
        }
    });

    Ok(Some(Signal {
        symbol: symbol.ticker.clone(),
        display_name: symbol.name.clone(),
        kind,
        price,
        readings: tagged,
        band: band_context,
        fired_at: now,
    }))
}
