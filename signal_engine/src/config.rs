//! Scanner configuration: parsing, normalization, and loading.
//!
//! This module defines a TOML-backed scanner profile that describes:
//! - The symbol universe: held portfolio plus an optional broader watchlist
//! - One threshold rule per timeframe, fetched or derived by aggregation
//! - Oscillator/band calibration, cooldown window and scan cadence
//! - An optional exchange session window
//!
//! Key behaviors:
//! - The portfolio/watchlist sections accept EITHER a bare ticker list or a
//!   ticker → display-name table (user configs drifted between both shapes
//!   over time); the boundary normalizes both into one canonical
//!   [`SymbolDescriptor`] list and the engine never branches on shape again.
//! - Normalization trims and uppercases tickers, rejects empties, and
//!   de-duplicates while preserving order (a ticker present in both sections
//!   keeps its portfolio entry). A [`NormalizationReport`] summarizes what
//!   changed.
//! - Validation happens at load: malformed timeframes, non-multiple
//!   aggregation targets, overlapping threshold bands and an undersized
//!   history window are configuration errors, not runtime surprises.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]
//! - Per-cycle snapshots from disk: [`TomlFileSource`]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, anyhow, bail};
use chrono::Duration;
use indexmap::IndexMap;
use market_data::models::timeframe::Timeframe;
use serde::Deserialize;

use crate::{
    bands::BandParams,
    confluence::{ConfluenceEvaluator, TimeframeRule},
    oscillator::KdjParams,
    session::SessionWindow,
};

/// Raw TOML shape, before normalization.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// `[scan]` section.
    pub scan: ScanCfg,
    /// `[kdj]` section; defaults to the canonical (9, 3).
    #[serde(default)]
    pub kdj: KdjCfg,
    /// `[bands]` section; bands are skipped entirely when absent.
    #[serde(default)]
    pub bands: Option<BandsCfg>,
    /// `[[timeframes]]` rule list.
    pub timeframes: Vec<TimeframeCfg>,
    /// `[session]` section; scanning is around-the-clock when absent.
    #[serde(default)]
    pub session: Option<SessionCfg>,
    /// `[portfolio]`: instruments currently held.
    #[serde(default)]
    pub portfolio: SymbolsCfg,
    /// `[watchlist]`: candidates for new entries.
    #[serde(default)]
    pub watchlist: SymbolsCfg,
}

/// Scan cadence and gating flags.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanCfg {
    /// Quiet window per symbol after an alert, in seconds.
    pub cooldown_secs: u64,
    /// Pause between scan cycles, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Whether unheld watchlist symbols may fire new-entry signals.
    #[serde(default)]
    pub scan_for_new_entries: bool,
    /// Whether unheld symbols may fire short signals (futures venues).
    #[serde(default)]
    pub allow_short: bool,
    /// Trailing bars requested per fetched timeframe.
    #[serde(default = "default_history_bars")]
    pub history_bars: usize,
}

fn default_interval_secs() -> u64 {
    180
}

fn default_history_bars() -> usize {
    100
}

/// Oscillator calibration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KdjCfg {
    /// Rolling high/low window, in bars.
    #[serde(default = "default_kdj_period")]
    pub period: usize,
    /// Smoothing length for the %K and %D passes.
    #[serde(default = "default_kdj_smooth")]
    pub smooth: u32,
}

impl Default for KdjCfg {
    fn default() -> Self {
        Self {
            period: default_kdj_period(),
            smooth: default_kdj_smooth(),
        }
    }
}

fn default_kdj_period() -> usize {
    9
}

fn default_kdj_smooth() -> u32 {
    3
}

/// Volatility-band calibration and the timeframe it annotates.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandsCfg {
    /// Which configured timeframe the band is computed on.
    pub timeframe: String,
    /// Rolling window over closes.
    #[serde(default = "default_band_period")]
    pub period: usize,
    /// Standard-deviation multiplier.
    #[serde(default = "default_band_mult")]
    pub std_mult: f64,
}

fn default_band_period() -> usize {
    20
}

fn default_band_mult() -> f64 {
    2.0
}

/// One threshold rule as written in TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeframeCfg {
    /// Compact timeframe (`"15m"`, `"1h"`, `"4h"`).
    pub timeframe: String,
    /// When set, this timeframe is aggregated from the given finer one
    /// instead of fetched from the vendor.
    #[serde(default)]
    pub derive_from: Option<String>,
    /// %J buy threshold (at or below).
    pub buy_j: f64,
    /// %D buy threshold (at or below).
    pub buy_d: f64,
    /// %J sell threshold (at or above).
    pub sell_j: f64,
    /// %D sell threshold (at or above).
    pub sell_d: f64,
}

/// Exchange session window as written in TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionCfg {
    /// IANA timezone name (e.g., "America/Argentina/Buenos_Aires").
    pub timezone: String,
    /// First local hour (inclusive) of the session.
    pub open_hour: u32,
    /// Local hour (exclusive) the session ends.
    pub close_hour: u32,
    /// Skip weekends entirely.
    #[serde(default = "default_true")]
    pub weekdays_only: bool,
}

fn default_true() -> bool {
    true
}

/// Symbol section: users write either a bare list or a ticker → name table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SymbolsCfg {
    /// `["MELI", "GLOB"]`; display names default to the ticker.
    List(Vec<String>),
    /// `{ MELI = "Mercado Libre" }`
    Table(IndexMap<String, String>),
}

impl Default for SymbolsCfg {
    fn default() -> Self {
        SymbolsCfg::List(Vec::new())
    }
}

impl SymbolsCfg {
    fn entries(&self) -> Vec<(String, String)> {
        match self {
            SymbolsCfg::List(tickers) => {
                tickers.iter().map(|t| (t.clone(), t.clone())).collect()
            }
            SymbolsCfg::Table(map) => {
                map.iter().map(|(t, n)| (t.clone(), n.clone())).collect()
            }
        }
    }
}

/// One instrument of the resolved universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDescriptor {
    /// Canonical (uppercase) vendor ticker.
    pub ticker: String,
    /// Display name used in alert messages.
    pub name: String,
    /// Whether the instrument is currently held.
    pub held: bool,
}

/// Where a timeframe's bars come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeframeSource {
    /// Requested from the data provider directly.
    Fetched,
    /// Aggregated from a finer fetched timeframe.
    Derived {
        /// The finer timeframe the bars are built from.
        from: Timeframe,
    },
}

/// A resolved threshold rule plus its data source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframePlan {
    /// Thresholds for this timeframe.
    pub rule: TimeframeRule,
    /// Fetched or derived.
    pub source: TimeframeSource,
}

/// Resolved band annotation plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPlan {
    /// Which configured timeframe the band reads.
    pub timeframe: Timeframe,
    /// Window and multiplier.
    pub params: BandParams,
}

/// Fully resolved, validated configuration snapshot for one or more cycles.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Per-symbol quiet window after an alert.
    pub cooldown: Duration,
    /// Pause between scan cycles, in seconds.
    pub interval_secs: u64,
    /// Whether unheld symbols may fire new-entry signals.
    pub scan_for_new_entries: bool,
    /// Whether unheld symbols may fire short signals.
    pub allow_short: bool,
    /// Trailing bars requested per fetched timeframe.
    pub history_bars: usize,
    /// Oscillator calibration.
    pub kdj: KdjParams,
    /// Optional band annotation plan.
    pub bands: Option<BandPlan>,
    /// Threshold rules in evaluation order; the first entry is the price
    /// reference for alerts.
    pub plans: Vec<TimeframePlan>,
    /// Optional exchange session window.
    pub session: Option<SessionWindow>,
    /// Canonical symbol universe, portfolio first.
    pub symbols: Vec<SymbolDescriptor>,
}

impl ScannerConfig {
    /// The unique timeframes that must be fetched from the provider: every
    /// fetched plan plus every aggregation source, in first-use order.
    pub fn fetch_timeframes(&self) -> Vec<Timeframe> {
        let mut out: Vec<Timeframe> = Vec::new();
        for plan in &self.plans {
            let tf = match plan.source {
                TimeframeSource::Fetched => plan.rule.timeframe,
                TimeframeSource::Derived { from } => from,
            };
            if !out.contains(&tf) {
                out.push(tf);
            }
        }
        out
    }

    /// Builds the confluence evaluator for this snapshot.
    pub fn evaluator(&self) -> ConfluenceEvaluator {
        ConfluenceEvaluator::new(
            self.plans.iter().map(|p| p.rule).collect(),
            self.scan_for_new_entries,
            self.allow_short,
        )
    }
}

/// Summary of changes performed while normalizing the symbol universe.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Tickers whose spelling changed (trimmed or uppercased).
    pub tickers_normalized: usize,
    /// Duplicate tickers collapsed, within and across sections.
    pub duplicates_collapsed: usize,
}

fn normalize_symbols(
    portfolio: &SymbolsCfg,
    watchlist: &SymbolsCfg,
    report: &mut NormalizationReport,
) -> anyhow::Result<Vec<SymbolDescriptor>> {
    let mut out: Vec<SymbolDescriptor> = Vec::new();

    for (held, section, entries) in [
        (true, "portfolio", portfolio.entries()),
        (false, "watchlist", watchlist.entries()),
    ] {
        for (raw_ticker, raw_name) in entries {
            let ticker = raw_ticker.trim().to_uppercase();
            if ticker.is_empty() {
                bail!("{section} contains an empty ticker");
            }
            if ticker != raw_ticker {
                report.tickers_normalized += 1;
            }
            let name = raw_name.trim();
            let name = if name.is_empty() { ticker.clone() } else { name.to_string() };

            if out.iter().any(|s| s.ticker == ticker) {
                report.duplicates_collapsed += 1;
                continue;
            }
            out.push(SymbolDescriptor { ticker, name, held });
        }
    }

    if out.is_empty() {
        bail!("no symbols configured: portfolio and watchlist are both empty");
    }
    Ok(out)
}

fn parse_timeframe(raw: &str, what: &str) -> anyhow::Result<Timeframe> {
    raw.parse::<Timeframe>()
        .map_err(|e| anyhow!("{what} {raw:?}: {e}"))
}

/// Resolves and validates a raw config into a [`ScannerConfig`].
///
/// Errors:
/// - Empty rule list, unparseable or duplicate timeframes
/// - `derive_from` that is not fixed-width or does not divide the target
/// - Overlapping buy/sell threshold bands
/// - A history window too small for the configured oscillator
/// - Empty tickers, an empty universe, or a malformed session window
pub fn resolve_config(raw: RawConfig) -> anyhow::Result<(ScannerConfig, NormalizationReport)> {
    let mut report = NormalizationReport::default();

    if raw.timeframes.is_empty() {
        bail!("at least one [[timeframes]] rule is required");
    }
    if raw.kdj.period == 0 || raw.kdj.smooth == 0 {
        bail!("kdj.period and kdj.smooth must be at least 1");
    }
    let kdj = KdjParams {
        period: raw.kdj.period,
        smooth: raw.kdj.smooth,
    };

    let mut plans: Vec<TimeframePlan> = Vec::with_capacity(raw.timeframes.len());
    for cfg in &raw.timeframes {
        let timeframe = parse_timeframe(&cfg.timeframe, "timeframe")?;
        if plans.iter().any(|p| p.rule.timeframe == timeframe) {
            bail!("duplicate [[timeframes]] entry for {timeframe}");
        }
        if cfg.buy_j >= cfg.sell_j || cfg.buy_d >= cfg.sell_d {
            bail!(
                "thresholds for {timeframe} overlap: buy band must sit strictly below sell band"
            );
        }

        let source = match &cfg.derive_from {
            None => TimeframeSource::Fetched,
            Some(raw_from) => {
                let from = parse_timeframe(raw_from, "derive_from")?;
                let fine = from
                    .fixed_secs()
                    .ok_or_else(|| anyhow!("derive_from {from} is not fixed-width"))?;
                let coarse = timeframe
                    .fixed_secs()
                    .ok_or_else(|| anyhow!("derived timeframe {timeframe} is not fixed-width"))?;
                if coarse <= fine || coarse % fine != 0 {
                    bail!("{timeframe} is not a whole multiple of derive_from {from}");
                }
                let multiple = (coarse / fine) as usize;
                // Partial leading bucket plus the withheld trailing one eat
                // into the window.
                let required = (kdj.min_bars() + 2) * multiple;
                if raw.scan.history_bars < required {
                    bail!(
                        "history_bars = {} cannot cover {} derived from {} (need at least {})",
                        raw.scan.history_bars,
                        timeframe,
                        from,
                        required
                    );
                }
                TimeframeSource::Derived { from }
            }
        };

        plans.push(TimeframePlan {
            rule: TimeframeRule {
                timeframe,
                buy_j: cfg.buy_j,
                buy_d: cfg.buy_d,
                sell_j: cfg.sell_j,
                sell_d: cfg.sell_d,
            },
            source,
        });
    }

    if raw.scan.history_bars < kdj.min_bars() {
        bail!(
            "history_bars = {} is below the oscillator minimum of {}",
            raw.scan.history_bars,
            kdj.min_bars()
        );
    }

    let bands = match &raw.bands {
        None => None,
        Some(cfg) => {
            let timeframe = parse_timeframe(&cfg.timeframe, "bands.timeframe")?;
            if !plans.iter().any(|p| p.rule.timeframe == timeframe) {
                bail!("bands.timeframe {timeframe} is not one of the configured timeframes");
            }
            if cfg.period == 0 {
                bail!("bands.period must be at least 1");
            }
            Some(BandPlan {
                timeframe,
                params: BandParams {
                    period: cfg.period,
                    std_mult: cfg.std_mult,
                },
            })
        }
    };

    let session = match &raw.session {
        None => None,
        Some(cfg) => {
            let tz: chrono_tz::Tz = cfg
                .timezone
                .parse()
                .map_err(|e| anyhow!("session.timezone {:?}: {e}", cfg.timezone))?;
            if cfg.open_hour >= cfg.close_hour || cfg.close_hour > 24 {
                bail!(
                    "session hours {}..{} are not a valid daily window",
                    cfg.open_hour,
                    cfg.close_hour
                );
            }
            Some(SessionWindow {
                tz,
                open_hour: cfg.open_hour,
                close_hour: cfg.close_hour,
                weekdays_only: cfg.weekdays_only,
            })
        }
    };

    let symbols = normalize_symbols(&raw.portfolio, &raw.watchlist, &mut report)?;

    let config = ScannerConfig {
        cooldown: Duration::seconds(raw.scan.cooldown_secs as i64),
        interval_secs: raw.scan.interval_secs,
        scan_for_new_entries: raw.scan.scan_for_new_entries,
        allow_short: raw.scan.allow_short,
        history_bars: raw.scan.history_bars,
        kdj,
        bands,
        plans,
        session,
        symbols,
    };
    Ok((config, report))
}

/// Parses and resolves a scanner profile from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<(ScannerConfig, NormalizationReport)> {
    let raw: RawConfig = toml::from_str(toml_str).context("failed to parse scanner TOML")?;
    resolve_config(raw)
}

/// Reads a scanner profile TOML file from disk, parses, and resolves it.
pub fn load_config_path(
    path: impl AsRef<Path>,
) -> anyhow::Result<(ScannerConfig, NormalizationReport)> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

/// Supplies one immutable configuration snapshot per scan cycle.
///
/// Taking the snapshot once at cycle start avoids tearing between a changed
/// watchlist and an in-flight cycle.
pub trait ConfigSource: Send + Sync {
    /// Produces the snapshot the next cycle will run against.
    fn snapshot(&self) -> anyhow::Result<Arc<ScannerConfig>>;
}

/// [`ConfigSource`] that re-reads a TOML file on every snapshot, so edits
/// apply from the next cycle without a restart.
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    /// Watches the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for TomlFileSource {
    fn snapshot(&self) -> anyhow::Result<Arc<ScannerConfig>> {
        let (config, report) = load_config_path(&self.path)?;
        if report != NormalizationReport::default() {
            tracing::debug!(?report, "configuration normalized");
        }
        Ok(Arc::new(config))
    }
}
