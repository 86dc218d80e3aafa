use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use market_data::providers::{BarsRequest, DataProvider, binance_rest::BinanceProvider};
use notifier::TelegramNotifier;
use signal_engine::{
    config::{ConfigSource, ScannerConfig, TimeframeSource, TomlFileSource, load_config_path},
    cooldown::CooldownGate,
    scan::run_cycle,
    signal::{Signal, SignalSink, SinkError},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Multi-timeframe KDJ market scanner")]
struct Cli {
    /// Path to the scanner profile (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan forever on the configured cadence
    Run,
    /// Run exactly one scan cycle and exit
    ScanOnce,
    /// Load the profile, print the normalization report and resolved universe
    CheckConfig,
    /// Probe every configured symbol against the data provider
    HealthCheck,
}

/// Stand-in sink for runs without Telegram credentials.
struct LogSink;

#[async_trait::async_trait]
impl SignalSink for LogSink {
    async fn deliver(&self, signal: &Signal) -> Result<(), SinkError> {
        info!(rendered = %notifier::render::render(signal), "signal (telegram disabled)");
        Ok(())
    }
}

enum Delivery {
    Telegram(TelegramNotifier),
    Log(LogSink),
}

impl Delivery {
    fn from_env() -> Self {
        match TelegramNotifier::from_env() {
            Ok(t) => {
                info!("telegram delivery enabled");
                Delivery::Telegram(t)
            }
            Err(e) => {
                warn!(error = %e, "telegram disabled, signals go to the log");
                Delivery::Log(LogSink)
            }
        }
    }

    fn sink(&self) -> &dyn SignalSink {
        match self {
            Delivery::Telegram(t) => t,
            Delivery::Log(l) => l,
        }
    }

    /// Best-effort service message (startup notice, health report).
    async fn announce(&self, text: &str) {
        match self {
            Delivery::Telegram(t) => {
                if let Err(e) = t.send_text(text).await {
                    warn!(error = %e, "announcement failed");
                }
            }
            Delivery::Log(_) => info!(message = text, "announcement"),
        }
    }
}

/// Probes every configured symbol with a tiny bars request; returns the
/// tickers the vendor cannot serve, with the reason.
async fn probe_universe(
    provider: &dyn DataProvider,
    config: &ScannerConfig,
) -> Vec<(String, String)> {
    let Some(&probe_tf) = config.fetch_timeframes().first() else {
        return Vec::new();
    };

    let mut dead = Vec::new();
    for symbol in &config.symbols {
        let req = BarsRequest {
            symbol: symbol.ticker.clone(),
            timeframe: probe_tf,
            limit: 2,
        };
        match provider.fetch_bars(&req).await {
            Ok(_) => info!(ticker = %symbol.ticker, "probe ok"),
            Err(e) => {
                warn!(ticker = %symbol.ticker, error = %e, "probe failed");
                dead.push((symbol.ticker.clone(), e.to_string()));
            }
        }
    }
    dead
}

async fn run(config_path: &str) -> Result<()> {
    let source = TomlFileSource::new(config_path);
    let initial = source.snapshot()?;
    let provider = BinanceProvider::new()?;
    let delivery = Delivery::from_env();

    // Startup health check: dead tickers are dropped for the process
    // lifetime and reported once.
    let dead = probe_universe(&provider, &initial).await;
    if !dead.is_empty() {
        let listing = dead
            .iter()
            .map(|(t, _)| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        delivery
            .announce(&format!(
                "⚠️ These tickers failed the data probe and will be ignored: {listing}"
            ))
            .await;
    }
    let dead: HashSet<String> = dead.into_iter().map(|(t, _)| t).collect();

    let live = initial.symbols.len() - dead.len();
    delivery
        .announce(&format!("👔 Scanner online. Watching {live} symbols."))
        .await;

    let mut gate = CooldownGate::new(initial.cooldown);
    loop {
        // One immutable snapshot per cycle; edits to the profile apply from
        // the next cycle on.
        let snapshot = match source.snapshot() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "config reload failed, retrying next cycle");
                tokio::time::sleep(std::time::Duration::from_secs(initial.interval_secs)).await;
                continue;
            }
        };

        if let Some(session) = &snapshot.session {
            if !session.is_open(Utc::now()) {
                info!("market closed, sleeping 30 minutes");
                tokio::time::sleep(std::time::Duration::from_secs(1_800)).await;
                continue;
            }
        }

        let mut config = (*snapshot).clone();
        config.symbols.retain(|s| !dead.contains(&s.ticker));
        gate.set_window(config.cooldown);

        run_cycle(&provider, delivery.sink(), &config, &mut gate, Utc::now()).await;

        tokio::time::sleep(std::time::Duration::from_secs(config.interval_secs)).await;
    }
}

async fn scan_once(config_path: &str) -> Result<()> {
    let (config, _) = load_config_path(config_path)?;
    let provider = BinanceProvider::new()?;
    let delivery = Delivery::from_env();
    let mut gate = CooldownGate::new(config.cooldown);

    let report = run_cycle(&provider, delivery.sink(), &config, &mut gate, Utc::now()).await;

    println!(
        "evaluated {}, fired {}, skipped {}",
        report.evaluated,
        report.signals.len(),
        report.skips.len()
    );
    for skip in &report.skips {
        println!("  {}: {}", skip.ticker, skip.reason);
    }
    Ok(())
}

fn check_config(config_path: &str) -> Result<()> {
    let (config, report) = load_config_path(config_path)?;

    println!("profile OK");
    println!(
        "normalization: {} tickers respelled, {} duplicates collapsed",
        report.tickers_normalized, report.duplicates_collapsed
    );
    println!(
        "cooldown {}s | interval {}s | new entries: {} | shorts: {}",
        config.cooldown.num_seconds(),
        config.interval_secs,
        config.scan_for_new_entries,
        config.allow_short
    );
    for plan in &config.plans {
        let source = match plan.source {
            TimeframeSource::Fetched => "fetched".to_string(),
            TimeframeSource::Derived { from } => format!("derived from {from}"),
        };
        println!(
            "rule {}: buy(J<={}, D<={}) sell(J>={}, D>={}) [{source}]",
            plan.rule.timeframe, plan.rule.buy_j, plan.rule.buy_d, plan.rule.sell_j, plan.rule.sell_d
        );
    }
    println!("universe ({} symbols):", config.symbols.len());
    for s in &config.symbols {
        let role = if s.held { "held" } else { "watch" };
        println!("  {:<10} {} [{role}]", s.ticker, s.name);
    }
    Ok(())
}

async fn health_check(config_path: &str) -> Result<()> {
    let (config, _) = load_config_path(config_path)?;
    let provider = BinanceProvider::new()?;

    let dead = probe_universe(&provider, &config).await;
    if dead.is_empty() {
        println!("all {} symbols respond", config.symbols.len());
    } else {
        println!("{} of {} symbols failed:", dead.len(), config.symbols.len());
        for (ticker, reason) in &dead {
            println!("  {ticker}: {reason}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::CheckConfig => check_config(&cli.config),
        Commands::HealthCheck => health_check(&cli.config).await,
        Commands::ScanOnce => scan_once(&cli.config).await,
        Commands::Run => {
            tokio::select! {
                res = run(&cli.config) => res,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, shutting down");
                    Ok(())
                }
            }
        }
    }
}
