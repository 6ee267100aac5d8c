// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the sample standard deviation over
// the same trailing window as the SMA. The bands are symmetric around the
// middle by construction.

use serde::Serialize;

use crate::error::AnalysisError;
use crate::indicators::sma::{rolling_mean, rolling_std};

/// Band series aligned with the input values.
#[derive(Debug, Clone, Serialize)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Calculate Bollinger Bands over `period` with `num_std` deviations.
///
/// Entries are NaN until `period` values are available.
pub fn calculate_bollinger(
    values: &[f64],
    period: usize,
    num_std: f64,
) -> Result<BollingerBands, AnalysisError> {
    if !(num_std.is_finite() && num_std >= 0.0) {
        return Err(AnalysisError::invalid(
            "num_std",
            format!("must be a finite non-negative number, got {num_std}"),
        ));
    }

    let middle = rolling_mean(values, period)?;
    let sigma = rolling_std(values, period)?;

    let upper = middle.iter().zip(&sigma).map(|(m, s)| m + num_std * s).collect();
    let lower = middle.iter().zip(&sigma).map(|(m, s)| m - num_std * s).collect();

    Ok(BollingerBands {
        middle,
        upper,
        lower,
    })
}
