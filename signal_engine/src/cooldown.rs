//! Per-symbol cooldown gate.
//!
//! After an alert fires for a symbol, the symbol goes quiet for a configured
//! window. A symbol under cooldown is skipped BEFORE any fetch or indicator
//! work; that courtesy toward the data vendor is part of the contract, not
//! an optimization that may be dropped.
//!
//! State lives for the process lifetime only; a restart resets every window.
//! The clock is always passed in, so tests drive the gate with synthetic
//! timestamps.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Records the last firing time per symbol and answers whether a symbol is
/// currently eligible for evaluation.
#[derive(Debug)]
pub struct CooldownGate {
    window: Duration,
    last_fired: HashMap<String, DateTime<Utc>>,
}

impl CooldownGate {
    /// Creates a gate with the given quiet window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    /// True unless the symbol fired less than one window ago.
    pub fn should_evaluate(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        match self.last_fired.get(symbol) {
            Some(&fired) => now - fired >= self.window,
            None => true,
        }
    }

    /// Marks the symbol as having fired at `now`, restarting its window.
    pub fn record_fired(&mut self, symbol: &str, now: DateTime<Utc>) {
        self.last_fired.insert(symbol.to_string(), now);
    }

    /// Updates the quiet window, keeping recorded firing times. Lets a
    /// hot-reloaded configuration take effect without resetting the gate.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }
}
