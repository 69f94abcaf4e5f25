// =============================================================================
// Relative Strength Index (RSI) — simple average over the window
// =============================================================================
//
// Step 1 — Sum positive deltas (gains) and the magnitude of negative deltas
//          (losses) across consecutive closes.
// Step 2 — Average both sums over `len - 1` deltas.
// Step 3 — RS  = avg_gain / avg_loss   (avg_loss == 0 is replaced by 1e-6)
//          RSI = 100 - 100 / (1 + RS)
//
// Unlike Wilder's smoothing there is no period: the whole window supplied by
// the exchange is one averaging span.
// =============================================================================

/// Substitute for a zero average loss so RS stays finite.
pub const ZERO_LOSS_EPSILON: f64 = 1e-6;

/// Compute the RSI over the full `closes` window.
///
/// # Edge cases
/// - fewer than 2 closes => `None` (no deltas to average)
/// - no losses => RSI just below 100 (epsilon guard)
/// - no movement at all => 0.0 (zero gain over epsilon loss)
/// - non-finite result => `None`
pub fn calculate_rsi(closes: &[f64]) -> Option<f64> {
    if closes.len() < 2 {
        return None;
    }

    let (gains, losses) = closes
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0_f64, 0.0_f64), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let deltas = (closes.len() - 1) as f64;
    let avg_gain = gains / deltas;
    let mut avg_loss = losses / deltas;
    if avg_loss == 0.0 {
        avg_loss = ZERO_LOSS_EPSILON;
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then_some(rsi)
}
