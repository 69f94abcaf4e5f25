// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators feeding the phase
// score.  Every public function returns `Option<T>` so callers are forced to
// handle empty (e.g. geo-blocked) series and degenerate windows.

pub mod ema;
pub mod rsi;
pub mod weekly;

use serde::Serialize;

use crate::market_data::Candle;

pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
pub use weekly::weekly_extrema;

/// Indicators derived for one asset in one cycle.
///
/// A field is `None` when its source series was empty or too short; scoring
/// rules that depend on a missing field do not fire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ema_15m: Option<f64>,
    pub rsi_15m: Option<f64>,
    pub ema_5m: Option<f64>,
    pub rsi_5m: Option<f64>,
    /// RSI of the fast timeframe (1m or 4m).
    pub rsi_fast: Option<f64>,
    pub weekly_high: Option<f64>,
    pub weekly_low: Option<f64>,
}

impl IndicatorSet {
    /// Derive the full indicator set from the four candle series.
    pub fn compute(
        daily: &[Candle],
        m15: &[Candle],
        m5: &[Candle],
        fast: &[Candle],
        ema_period: usize,
    ) -> Self {
        let closes_15m = closes(m15);
        let closes_5m = closes(m5);
        let closes_fast = closes(fast);
        let weekly = weekly_extrema(daily);

        Self {
            ema_15m: calculate_ema(&closes_15m, ema_period),
            rsi_15m: calculate_rsi(&closes_15m),
            ema_5m: calculate_ema(&closes_5m, ema_period),
            rsi_5m: calculate_rsi(&closes_5m),
            rsi_fast: calculate_rsi(&closes_fast),
            weekly_high: weekly.map(|(high, _)| high),
            weekly_low: weekly.map(|(_, low)| low),
        }
    }
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * 60_000, c + 1.0, c - 1.0, c))
            .collect()
    }

    #[test]
    fn compute_with_all_series_empty() {
        let set = IndicatorSet::compute(&[], &[], &[], &[], 28);
        assert_eq!(set, IndicatorSet::default());
    }

    #[test]
    fn compute_fills_every_field() {
        let rising = series(&[1.0, 2.0, 3.0, 4.0]);
        let set = IndicatorSet::compute(&rising, &rising, &rising, &rising, 28);
        assert!(set.ema_15m.is_some());
        assert!(set.rsi_15m.unwrap() > 99.0);
        assert!(set.ema_5m.is_some());
        assert!(set.rsi_5m.is_some());
        assert!(set.rsi_fast.is_some());
        assert_eq!(set.weekly_high, Some(5.0));
        assert_eq!(set.weekly_low, Some(3.0));
    }

    #[test]
    fn single_candle_leaves_rsi_empty() {
        let one = series(&[10.0]);
        let set = IndicatorSet::compute(&one, &one, &one, &one, 28);
        assert_eq!(set.ema_15m, Some(10.0));
        assert!(set.rsi_15m.is_none());
        assert!(set.rsi_fast.is_none());
    }
}
