//! End-to-end cycle tests against a scripted provider and a collecting sink.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use market_data::{
    models::{
        bar::{Bar, BarSeries},
        timeframe::Timeframe,
    },
    providers::{BarsRequest, DataProvider, ProviderError},
};
use signal_engine::{
    config::{ScannerConfig, SymbolDescriptor, TimeframePlan, TimeframeSource},
    confluence::{SignalKind, TimeframeRule},
    cooldown::CooldownGate,
    oscillator::KdjParams,
    scan::{SkipReason, run_cycle},
    signal::{Signal, SignalSink, SinkError},
};

struct MockProvider {
    series: HashMap<(String, Timeframe), BarSeries>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, Timeframe)>>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            series: HashMap::new(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_series(mut self, symbol: &str, series: BarSeries) -> Self {
        self.series
            .insert((symbol.to_string(), series.timeframe), series);
        self
    }

    fn with_outage(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    fn calls_for(&self, symbol: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == symbol)
            .count()
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn fetch_bars(&self, req: &BarsRequest) -> Result<BarSeries, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((req.symbol.clone(), req.timeframe));
        if self.failing.contains(&req.symbol) {
            return Err(ProviderError::Api("simulated outage".to_string()));
        }
        self.series
            .get(&(req.symbol.clone(), req.timeframe))
            .cloned()
            .ok_or(ProviderError::Empty {
                symbol: req.symbol.clone(),
            })
    }
}

struct MockSink {
    delivered: Mutex<Vec<Signal>>,
    fail: bool,
}

impl MockSink {
    fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl SignalSink for MockSink {
    async fn deliver(&self, signal: &Signal) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError("telegram down".to_string()));
        }
        self.delivered.lock().unwrap().push(signal.clone());
        Ok(())
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()
}

fn hourly_bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: start() + Duration::hours(i),
        open,
        high,
        low,
        close,
        volume: Some(1.0),
    }
}

/// Flat prices: the oscillator settles at the neutral 50 everywhere.
fn flat_series(timeframe: Timeframe, hours_per_bar: i64, n: usize) -> BarSeries {
    let bars = (0..n)
        .map(|i| {
            let mut bar = hourly_bar(0, 100.0, 100.0, 100.0, 100.0);
            bar.timestamp = start() + Duration::hours(i as i64 * hours_per_bar);
            bar
        })
        .collect();
    BarSeries::new("X", timeframe, bars)
}

/// Flat, then every bar closes on a fresh low: %J dives under 0, %D under 25.
fn oversold_series(n_flat: usize, n_drop: usize) -> BarSeries {
    let mut bars = Vec::new();
    for i in 0..n_flat {
        bars.push(hourly_bar(i as i64, 100.0, 100.0, 100.0, 100.0));
    }
    let mut price = 100.0;
    for i in 0..n_drop {
        let open = price;
        price -= 10.0;
        bars.push(hourly_bar((n_flat + i) as i64, open, open, price, price));
    }
    BarSeries::new("X", Timeframe::hours(1).unwrap(), bars)
}

fn sniper_rule(timeframe: Timeframe) -> TimeframeRule {
    TimeframeRule {
        timeframe,
        buy_j: 0.0,
        buy_d: 25.0,
        sell_j: 100.0,
        sell_d: 75.0,
    }
}

fn symbol(ticker: &str, held: bool) -> SymbolDescriptor {
    SymbolDescriptor {
        ticker: ticker.to_string(),
        name: ticker.to_string(),
        held,
    }
}

fn sniper_config(symbols: Vec<SymbolDescriptor>, scan_for_new_entries: bool) -> ScannerConfig {
    ScannerConfig {
        cooldown: Duration::hours(3),
        interval_secs: 60,
        scan_for_new_entries,
        allow_short: false,
        history_bars: 60,
        kdj: KdjParams::default(),
        bands: None,
        plans: vec![TimeframePlan {
            rule: sniper_rule(Timeframe::hours(1).unwrap()),
            source: TimeframeSource::Fetched,
        }],
        session: None,
        symbols,
    }
}

#[tokio::test]
async fn held_symbol_fires_average_down_and_enters_cooldown() {
    let provider = MockProvider::new().with_series("MELI", oversold_series(20, 6));
    let sink = MockSink::new();
    let config = sniper_config(vec![symbol("MELI", true)], false);
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, &sink, &config, &mut gate, start()).await;
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].kind, SignalKind::AverageDown);
    assert_eq!(sink.count(), 1);
    let fetches_after_first = provider.calls_for("MELI");

    // One hour later the symbol is still quiet: skipped up front, without
    // even a fetch.
    let report = run_cycle(&provider, &sink, &config, &mut gate, start() + Duration::hours(1)).await;
    assert_eq!(report.evaluated, 0);
    assert_eq!(
        report.skips,
        vec![signal_engine::scan::SymbolSkip {
            ticker: "MELI".to_string(),
            reason: SkipReason::Cooldown,
        }]
    );
    assert_eq!(provider.calls_for("MELI"), fetches_after_first);

    // After the window, it evaluates (and fires) again.
    let report = run_cycle(&provider, &sink, &config, &mut gate, start() + Duration::hours(4)).await;
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.signals.len(), 1);
}

#[tokio::test]
async fn new_entry_respects_the_mode_flag() {
    let provider = MockProvider::new().with_series("SNAP", oversold_series(20, 6));
    let sink = MockSink::new();
    let mut gate = CooldownGate::new(Duration::hours(3));

    let off = sniper_config(vec![symbol("SNAP", false)], false);
    let report = run_cycle(&provider, &sink, &off, &mut gate, start()).await;
    assert_eq!(report.evaluated, 1);
    assert!(report.signals.is_empty());

    let on = sniper_config(vec![symbol("SNAP", false)], true);
    let report = run_cycle(&provider, &sink, &on, &mut gate, start()).await;
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].kind, SignalKind::NewEntry);
}

#[tokio::test]
async fn one_outage_never_aborts_the_rest_of_the_scan() {
    let provider = MockProvider::new()
        .with_outage("GLOB")
        .with_series("MELI", oversold_series(20, 6));
    let sink = MockSink::new();
    let config = sniper_config(vec![symbol("GLOB", true), symbol("MELI", true)], false);
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, &sink, &config, &mut gate, start()).await;
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].symbol, "MELI");
    assert_eq!(report.skips.len(), 1);
    assert!(matches!(report.skips[0].reason, SkipReason::Fetch { .. }));
    // A fetch failure must not start a cooldown.
    assert!(gate.should_evaluate("GLOB", start() + Duration::seconds(1)));
}

#[tokio::test]
async fn short_series_skips_with_insufficient_data() {
    let provider = MockProvider::new().with_series("MELI", oversold_series(5, 5));
    let sink = MockSink::new();
    let config = sniper_config(vec![symbol("MELI", true)], false);
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, &sink, &config, &mut gate, start()).await;
    assert_eq!(report.evaluated, 0);
    assert!(matches!(
        report.skips[0].reason,
        SkipReason::InsufficientData { .. }
    ));
}

#[tokio::test]
async fn sink_failure_is_swallowed_and_cooldown_stands() {
    let provider = MockProvider::new().with_series("MELI", oversold_series(20, 6));
    let sink = MockSink::failing();
    let config = sniper_config(vec![symbol("MELI", true)], false);
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, &sink, &config, &mut gate, start()).await;
    // The decision happened even though delivery failed.
    assert_eq!(report.signals.len(), 1);
    assert_eq!(sink.count(), 0);
    assert!(!gate.should_evaluate("MELI", start() + Duration::hours(1)));
}

#[tokio::test]
async fn neutral_market_fires_nothing() {
    let provider =
        MockProvider::new().with_series("MELI", flat_series(Timeframe::hours(1).unwrap(), 1, 40));
    let sink = MockSink::new();
    let config = sniper_config(vec![symbol("MELI", true)], false);
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, &sink, &config, &mut gate, start()).await;
    assert_eq!(report.evaluated, 1);
    assert!(report.signals.is_empty());
    assert!(report.skips.is_empty());
}

#[tokio::test]
async fn derived_timeframe_is_aggregated_not_fetched() {
    // 60 flat hours (15 complete 4h buckets), then 28 falling hours: the
    // derived 4h series ends deeply oversold.
    let mut bars = Vec::new();
    for i in 0..60 {
        bars.push(hourly_bar(i, 100.0, 100.0, 100.0, 100.0));
    }
    let mut price = 100.0;
    for i in 60..88 {
        let open = price;
        price -= 2.5;
        bars.push(hourly_bar(i, open, open, price, price));
    }
    let hourly = BarSeries::new("BTCUSDT", Timeframe::hours(1).unwrap(), bars);

    let provider = MockProvider::new().with_series("BTCUSDT", hourly);
    let sink = MockSink::new();
    let mut config = sniper_config(vec![symbol("BTCUSDT", true)], false);
    config.history_bars = 100;
    config.plans = vec![TimeframePlan {
        rule: sniper_rule(Timeframe::hours(4).unwrap()),
        source: TimeframeSource::Derived {
            from: Timeframe::hours(1).unwrap(),
        },
    }];
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, &sink, &config, &mut gate, start()).await;
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].kind, SignalKind::AverageDown);
    assert_eq!(
        report.signals[0].readings[0].timeframe,
        Timeframe::hours(4).unwrap()
    );

    // Only the 1h source was ever requested from the vendor.
    let calls = provider.calls.lock().unwrap();
    assert!(calls.iter().all(|(_, tf)| *tf == Timeframe::hours(1).unwrap()));
}

#[tokio::test]
async fn cascade_needs_every_timeframe_to_agree() {
    let m15 = Timeframe::minutes(15).unwrap();
    let h1 = Timeframe::hours(1).unwrap();
    let h4 = Timeframe::hours(4).unwrap();

    // 15m and 1h oversold, 4h stubbornly neutral.
    let mut oversold_15m = oversold_series(20, 6);
    oversold_15m.timeframe = m15;
    let provider = MockProvider::new()
        .with_series("BTCUSDT", oversold_15m)
        .with_series("BTCUSDT", oversold_series(20, 6))
        .with_series("BTCUSDT", flat_series(h4, 4, 40));

    let sink = MockSink::new();
    let mut config = sniper_config(vec![symbol("BTCUSDT", true)], false);
    config.plans = vec![
        TimeframePlan {
            rule: sniper_rule(m15),
            source: TimeframeSource::Fetched,
        },
        TimeframePlan {
            rule: sniper_rule(h1),
            source: TimeframeSource::Fetched,
        },
        TimeframePlan {
            rule: sniper_rule(h4),
            source: TimeframeSource::Fetched,
        },
    ];
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, &sink, &config, &mut gate, start()).await;
    assert_eq!(report.evaluated, 1);
    assert!(report.signals.is_empty(), "strict AND, never two of three");
}
