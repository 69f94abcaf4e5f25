// =============================================================================
// Weekly Anchor — high/low of the most recent Sunday daily candle
// =============================================================================

use chrono::{Datelike, TimeZone, Utc, Weekday};

use crate::market_data::Candle;

/// Return `(high, low)` of the newest daily candle that opened on a Sunday
/// (UTC). Falls back to the newest candle when the window has no Sunday.
///
/// Returns `None` for an empty window.
pub fn weekly_extrema(daily: &[Candle]) -> Option<(f64, f64)> {
    let sunday = daily.iter().rev().find(|c| {
        Utc.timestamp_millis_opt(c.open_time)
            .single()
            .map(|dt| dt.weekday() == Weekday::Sun)
            .unwrap_or(false)
    });

    sunday.or_else(|| daily.last()).map(|c| (c.high, c.low))
}
