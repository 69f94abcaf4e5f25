// =============================================================================
// Phase Score — hierarchical additive rules clamped to [1, 10]
// =============================================================================
//
// Tiers (each rule evaluated independently against the same inputs):
//   1. Weekly anchor   +3 price > low   +2 price > high   -2 price < low
//   2. 15m trend       +2 RSI>50 & price>EMA    -2 RSI<50 & price<EMA
//   3. 5m momentum     +1 RSI>70 & price>EMA    -1 RSI<30 & price<EMA
//   4. Fast RSI        +0.5 RSI<15              -0.5 RSI>85
//
// Rules are cumulative: a price above the weekly high also sits above the
// weekly low and collects both bonuses.  Do not fold them into else-if chains.
// =============================================================================

use crate::indicators::IndicatorSet;

pub const BASE_SCORE: f64 = 1.0;
pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// Compute the bounded phase score for `price` given its indicator set.
pub fn compute_score(price: f64, ind: &IndicatorSet) -> f64 {
    if !price.is_finite() {
        return MIN_SCORE;
    }

    let above = |level: Option<f64>| level.is_some_and(|l| price > l);
    let below = |level: Option<f64>| level.is_some_and(|l| price < l);
    let rsi_gt = |rsi: Option<f64>, t: f64| rsi.is_some_and(|r| r > t);
    let rsi_lt = |rsi: Option<f64>, t: f64| rsi.is_some_and(|r| r < t);

    let mut s = BASE_SCORE;

    // Tier 1: weekly anchor
    if above(ind.weekly_low) {
        s += 3.0;
    }
    if above(ind.weekly_high) {
        s += 2.0;
    }
    if below(ind.weekly_low) {
        s -= 2.0;
    }

    // Tier 2: 15m
    if rsi_gt(ind.rsi_15m, 50.0) && above(ind.ema_15m) {
        s += 2.0;
    }
    if rsi_lt(ind.rsi_15m, 50.0) && below(ind.ema_15m) {
        s -= 2.0;
    }

    // Tier 3: 5m
    if rsi_gt(ind.rsi_5m, 70.0) && above(ind.ema_5m) {
        s += 1.0;
    }
    if rsi_lt(ind.rsi_5m, 30.0) && below(ind.ema_5m) {
        s -= 1.0;
    }

    // Tier 4: fast timeframe
    if rsi_lt(ind.rsi_fast, 15.0) {
        s += 0.5;
    }
    if rsi_gt(ind.rsi_fast, 85.0) {
        s -= 0.5;
    }

    s.clamp(MIN_SCORE, MAX_SCORE)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn full(
        weekly_high: f64,
        weekly_low: f64,
        ema_15m: f64,
        rsi_15m: f64,
        ema_5m: f64,
        rsi_5m: f64,
        rsi_fast: f64,
    ) -> IndicatorSet {
        IndicatorSet {
            ema_15m: Some(ema_15m),
            rsi_15m: Some(rsi_15m),
            ema_5m: Some(ema_5m),
            rsi_5m: Some(rsi_5m),
            rsi_fast: Some(rsi_fast),
            weekly_high: Some(weekly_high),
            weekly_low: Some(weekly_low),
        }
    }

    #[test]
    fn worked_example_scores_eight() {
        // price 100, low 90, high 95, RSI15 60 / EMA15 98, RSI5 40, fast 50
        let ind = full(95.0, 90.0, 98.0, 60.0, 99.0, 40.0, 50.0);
        let s = compute_score(100.0, &ind);
        assert!((s - 8.0).abs() < 1e-12);
        assert_eq!(Phase::classify(s), Phase::BullishIncline);
    }

    #[test]
    fn all_bullish_stays_within_upper_bound() {
        // 1 + 3 + 2 + 2 + 1 + 0.5 = 9.5 is the real maximum; a huge price
        // still never escapes the clamp.
        let ind = full(95.0, 90.0, 98.0, 90.0, 98.0, 90.0, 5.0);
        let s = compute_score(1e12, &ind);
        assert!((s - 9.5).abs() < 1e-12);
        assert!(s <= MAX_SCORE);
    }

    #[test]
    fn all_bearish_clamps_at_one() {
        // 1 - 2 - 2 - 1 - 0.5 = -4.5 => 1
        let ind = full(95.0, 90.0, 98.0, 10.0, 98.0, 10.0, 95.0);
        assert_eq!(compute_score(1.0, &ind), MIN_SCORE);
    }

    #[test]
    fn weekly_tier_is_cumulative() {
        let mut ind = IndicatorSet::default();
        ind.weekly_high = Some(95.0);
        ind.weekly_low = Some(90.0);
        // between low and high: only +3
        assert_eq!(compute_score(92.0, &ind), 4.0);
        // above both: +3 and +2
        assert_eq!(compute_score(96.0, &ind), 6.0);
        // exactly on the low fires nothing
        assert_eq!(compute_score(90.0, &ind), 1.0);
    }

    #[test]
    fn fast_rsi_half_steps() {
        let mut ind = IndicatorSet::default();
        ind.weekly_low = Some(50.0);
        ind.rsi_fast = Some(10.0);
        assert_eq!(compute_score(60.0, &ind), 4.5);
        ind.rsi_fast = Some(90.0);
        assert_eq!(compute_score(60.0, &ind), 3.5);
    }

    #[test]
    fn missing_indicators_do_not_fire() {
        assert_eq!(compute_score(100.0, &IndicatorSet::default()), BASE_SCORE);
    }

    #[test]
    fn score_is_always_within_bounds() {
        let prices = [f64::MIN_POSITIVE, 0.0, 1.0, 50.0, 1e9, -5.0, f64::NAN];
        let rsis = [0.0, 14.0, 29.0, 50.0, 71.0, 86.0, 100.0];
        for &p in &prices {
            for &r in &rsis {
                let ind = full(95.0, 90.0, 98.0, r, 97.0, r, r);
                let s = compute_score(p, &ind);
                assert!((MIN_SCORE..=MAX_SCORE).contains(&s), "score {s} for price {p} rsi {r}");
            }
        }
    }

    #[test]
    fn non_finite_price_scores_floor() {
        let ind = IndicatorSet {
            rsi_fast: Some(5.0),
            ..IndicatorSet::default()
        };
        assert_eq!(compute_score(f64::NAN, &ind), MIN_SCORE);
        assert_eq!(compute_score(f64::INFINITY, &ind), MIN_SCORE);
        // sanity: the fast rule does fire for a finite price
        assert_eq!(compute_score(100.0, &ind), 1.5);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let ind = full(95.0, 90.0, 98.0, 60.0, 99.0, 40.0, 50.0);
        assert_eq!(compute_score(100.0, &ind), compute_score(100.0, &ind));
    }
}
