// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The EMA is seeded with the first close and runs across the whole supplied
// window, so the result is a cumulative EMA over whatever the exchange
// returned rather than a fixed look-back.
// =============================================================================

/// Compute the cumulative EMA of `closes` with smoothing `period`.
///
/// # Edge cases
/// - empty input => `None`
/// - `period == 0` => `None`
/// - a non-finite intermediate value => `None`
pub fn calculate_ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let (&seed, rest) = closes.split_first()?;

    let multiplier = 2.0 / (period + 1) as f64;
    let ema = rest
        .iter()
        .fold(seed, |prev, &close| close * multiplier + prev * (1.0 - multiplier));

    ema.is_finite().then_some(ema)
}
