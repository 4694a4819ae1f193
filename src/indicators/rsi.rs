// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Gains / losses from consecutive price differences.
// Step 2 — Seed average gain / average loss with the SMA of the first
//          `period` gains / losses.
// Step 3 — Wilder smoothing:
//            avg = (prev_avg * (period - 1) + value) / period
// Step 4 — RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//
// A zero average loss saturates RSI at 100.  This is an explicit branch, not
// the IEEE `x / 0 = inf` path.
// =============================================================================

pub const DEFAULT_PERIOD: usize = 14;

/// Compute the dense RSI series for `prices` and `period`.
///
/// Element `j` of the result corresponds to `prices[period + j]`: the first
/// `period` differences seed the averages.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `prices.len() < period + 1` => empty vec
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period + 1 {
        return Vec::new();
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = prices
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    let period_f = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period_f;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period_f;

    let mut result = Vec::with_capacity(gains.len() - period + 1);
    result.push(rsi_from_averages(avg_gain, avg_loss));

    for (&gain, &loss) in gains[period..].iter().zip(&losses[period..]) {
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
        result.push(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
