//! Cross-timeframe confluence evaluation.
//!
//! One rule per configured timeframe; a direction only fires when EVERY rule
//! agrees (strict AND; two of three is nothing, never a majority vote).
//! Thresholds may differ per timeframe: cascade calibrations demand more
//! extreme readings from the shorter frames than from the longer ones.

use market_data::models::timeframe::Timeframe;

use crate::oscillator::KdjReading;

/// Threshold rule for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeRule {
    /// The timeframe this rule reads.
    pub timeframe: Timeframe,
    /// %J at or below this arms the buy side.
    pub buy_j: f64,
    /// %D at or below this arms the buy side.
    pub buy_d: f64,
    /// %J at or above this arms the sell side.
    pub sell_j: f64,
    /// %D at or above this arms the sell side.
    pub sell_d: f64,
}

/// What a firing decision means for the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Buy side, instrument not yet held: open a position.
    NewEntry,
    /// Buy side, instrument already held: average down.
    AverageDown,
    /// Sell side, instrument held: exit into strength.
    TakeProfit,
    /// Sell side, instrument not held, on venues configured for it.
    Short,
}

/// Trade direction of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Long/buy side.
    Buy,
    /// Short/sell side.
    Sell,
}

impl SignalKind {
    /// The direction this kind trades in.
    pub fn direction(&self) -> Direction {
        match self {
            SignalKind::NewEntry | SignalKind::AverageDown => Direction::Buy,
            SignalKind::TakeProfit | SignalKind::Short => Direction::Sell,
        }
    }
}

/// Decides whether a set of per-timeframe readings fires a signal for one
/// symbol, given its portfolio membership.
#[derive(Debug, Clone)]
pub struct ConfluenceEvaluator {
    rules: Vec<TimeframeRule>,
    scan_for_new_entries: bool,
    allow_short: bool,
}

impl ConfluenceEvaluator {
    /// Builds an evaluator over the configured rules and mode flags.
    pub fn new(rules: Vec<TimeframeRule>, scan_for_new_entries: bool, allow_short: bool) -> Self {
        Self {
            rules,
            scan_for_new_entries,
            allow_short,
        }
    }

    /// The configured rules, in evaluation order.
    pub fn rules(&self) -> &[TimeframeRule] {
        &self.rules
    }

    /// Evaluates one symbol for one cycle.
    ///
    /// `readings` is positional with [`ConfluenceEvaluator::rules`]: one
    /// reading per configured timeframe, supplied by the scan loop. Returns
    /// `None` for no signal; never mutates anything.
    ///
    /// The buy side is checked first and short-circuits the sell side, so
    /// malformed threshold sets where both would hold resolve to buy.
    pub fn evaluate(&self, held: bool, readings: &[KdjReading]) -> Option<SignalKind> {
        if self.rules.is_empty() || readings.len() != self.rules.len() {
            debug_assert_eq!(readings.len(), self.rules.len());
            return None;
        }

        let buy = self
            .rules
            .iter()
            .zip(readings)
            .all(|(rule, r)| r.j <= rule.buy_j && r.d <= rule.buy_d);
        if buy {
            return if held {
                Some(SignalKind::AverageDown)
            } else if self.scan_for_new_entries {
                Some(SignalKind::NewEntry)
            } else {
                None
            };
        }

        let sell = self
            .rules
            .iter()
            .zip(readings)
            .all(|(rule, r)| r.j >= rule.sell_j && r.d >= rule.sell_d);
        if sell {
            return if held {
                Some(SignalKind::TakeProfit)
            } else if self.allow_short {
                Some(SignalKind::Short)
            } else {
                None
            };
        }

        None
    }
}
