// =============================================================================
// Relative Strength Index (RSI) - Wilder-style exponential smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1: Compute price changes (deltas) from consecutive values.
// Step 2: Split into gains (positive deltas, else 0) and losses (magnitude of
//         negative deltas, else 0).
// Step 3: Smooth both with an EMA of alpha = 1 / period, seeded by the first
//         delta (no SMA warm-up, no bias adjustment):
//           avg_t = avg_{t-1} * (period - 1) / period + x_t / period
// Step 4: RS  = avg_gain / avg_loss
//         RSI = 100 - 100 / (1 + RS)
//
// Zero average loss has no finite RS; RSI is reported as exactly 100 in that
// case, including a perfectly flat series.
//
// Zones:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use crate::error::AnalysisError;
use crate::indicators::ema::ema_alpha;
use crate::indicators::sma::check_window;

/// Compute the RSI series aligned with `values`.
///
/// Entry 0 is always NaN (no delta yet); from entry 1 on every position whose
/// delta is defined carries a value in `[0, 100]`.
///
/// # Edge cases
/// - `period == 0` => `InvalidParameter`
/// - fewer than 2 values => all NaN
/// - average loss of zero => 100.0
pub fn calculate_rsi(values: &[f64], period: usize) -> Result<Vec<f64>, AnalysisError> {
    check_window("period", period)?;

    let mut gains = vec![f64::NAN; values.len()];
    let mut losses = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        let delta = values[i] - values[i - 1];
        if delta.is_nan() {
            continue;
        }
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }

    let alpha = 1.0 / period as f64;
    let avg_gain = ema_alpha(&gains, alpha)?;
    let avg_loss = ema_alpha(&losses, alpha)?;

    Ok(avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| rsi_from_averages(g, l))
        .collect())
}

/// Label for an RSI reading.
pub fn rsi_zone(value: f64) -> &'static str {
    if value >= 70.0 {
        "OVERBOUGHT"
    } else if value <= 30.0 {
        "OVERSOLD"
    } else {
        "NEUTRAL"
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        return f64::NAN;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}
