//! Loading a realistic profile from disk.

use std::io::Write;

use signal_engine::config::{TimeframeSource, load_config_path};

const PROFILE: &str = r#"
[scan]
cooldown_secs = 10800
interval_secs = 180
scan_for_new_entries = true
history_bars = 120

[kdj]
period = 9
smooth = 3

[bands]
timeframe = "1h"
period = 20
std_mult = 2.0

[session]
timezone = "America/Argentina/Buenos_Aires"
open_hour = 11
close_hour = 17

[[timeframes]]
timeframe = "1h"
buy_j = 0.0
buy_d = 25.0
sell_j = 100.0
sell_d = 75.0

[[timeframes]]
timeframe = "4h"
derive_from = "1h"
buy_j = 20.0
buy_d = 35.0
sell_j = 80.0
sell_d = 65.0

[portfolio]
MELI = "Mercado Libre"
GLOB = "Globant"
META = "Meta Platforms"

[watchlist]
SNAP = "SNAP"
UBER = "UBER"
PLTR = "Palantir"
"#;

#[test]
fn full_profile_loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(PROFILE.as_bytes()).expect("write profile");

    let (config, report) = load_config_path(file.path()).expect("load");

    assert_eq!(config.cooldown.num_hours(), 3);
    assert_eq!(config.interval_secs, 180);
    assert!(config.scan_for_new_entries);
    assert_eq!(config.history_bars, 120);

    assert_eq!(config.plans.len(), 2);
    assert!(matches!(config.plans[1].source, TimeframeSource::Derived { .. }));
    assert_eq!(config.fetch_timeframes().len(), 1);

    let bands = config.bands.expect("bands configured");
    assert_eq!(bands.params.period, 20);

    assert!(config.session.is_some());

    assert_eq!(config.symbols.len(), 6);
    assert_eq!(config.symbols.iter().filter(|s| s.held).count(), 3);
    assert_eq!(config.symbols[0].name, "Mercado Libre");

    assert_eq!(report.tickers_normalized, 0);
    assert_eq!(report.duplicates_collapsed, 0);
}

#[test]
fn missing_file_is_a_context_rich_error() {
    let err = load_config_path("/definitely/not/here.toml").unwrap_err();
    assert!(err.to_string().contains("read config file"));
}
