//! Signal → chat message rendering.

use std::fmt::Write;

use signal_engine::{confluence::SignalKind, signal::Signal};

/// Renders one signal into the Telegram message body.
pub fn render(signal: &Signal) -> String {
    let mut msg = String::new();

    match signal.kind {
        SignalKind::NewEntry => {
            let _ = writeln!(
                msg,
                "💎 NEW ENTRY: {} ({})",
                signal.display_name, signal.symbol
            );
            let _ = writeln!(msg, "Entry price: {:.2}", signal.price);
        }
        SignalKind::AverageDown => {
            let _ = writeln!(
                msg,
                "📉 AVERAGE-DOWN: {} ({})",
                signal.display_name, signal.symbol
            );
            let _ = writeln!(msg, "Add to position at {:.2}", signal.price);
        }
        SignalKind::TakeProfit => {
            let _ = writeln!(
                msg,
                "💰 TAKE PROFIT: {} ({})",
                signal.display_name, signal.symbol
            );
            let _ = writeln!(msg, "Sell now at {:.2}", signal.price);
        }
        SignalKind::Short => {
            let _ = writeln!(msg, "🔴 SHORT: {} ({})", signal.display_name, signal.symbol);
            let _ = writeln!(msg, "Price: {:.2}", signal.price);
        }
    }

    if let Some(band) = &signal.band {
        let state = if band.breached { "BREAKING" } else { "INSIDE" };
        let _ = writeln!(
            msg,
            "Band: {:.4} | {} ({:+.2}%)",
            band.reference, state, band.distance_pct
        );
    }

    let _ = writeln!(msg, "----------------");
    for tagged in &signal.readings {
        let _ = writeln!(
            msg,
            "J({}): {:.2} | D: {:.2}",
            tagged.timeframe, tagged.reading.j, tagged.reading.d
        );
    }

    msg.trim_end().to_string()
}
