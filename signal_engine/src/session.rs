//! Market-session gate.
//!
//! Stock venues only trade a few hours a day; scanning outside them wastes
//! vendor quota and wakes nobody up. Crypto deployments simply omit the
//! session section and scan around the clock.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// A daily trading window in a fixed IANA timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    /// Exchange timezone.
    pub tz: Tz,
    /// First local hour (inclusive) the scanner is active.
    pub open_hour: u32,
    /// Local hour (exclusive) the scanner goes back to sleep.
    pub close_hour: u32,
    /// Skip Saturdays and Sundays entirely.
    pub weekdays_only: bool,
}

impl SessionWindow {
    /// Whether the session is open at the given UTC instant.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        if self.weekdays_only && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        (self.open_hour..self.close_hour).contains(&local.hour())
    }
}
