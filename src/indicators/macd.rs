// =============================================================================
// MACD - Moving Average Convergence / Divergence
// =============================================================================
//
//   MACD      = EMA(fast) - EMA(slow)
//   Signal    = EMA(signal) of the MACD line
//   Histogram = MACD - Signal
//
// All three EMAs are span-based and seeded at their first value, so the MACD
// line starts at 0 on the first bar.

use serde::Serialize;

use crate::error::AnalysisError;
use crate::indicators::ema::ema_span;

#[derive(Debug, Clone, Serialize)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn calculate_macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<MacdSeries, AnalysisError> {
    if fast >= slow {
        return Err(AnalysisError::invalid(
            "fast",
            format!("fast span ({fast}) must be shorter than slow span ({slow})"),
        ));
    }

    let fast_ema = ema_span(values, fast)?;
    let slow_ema = ema_span(values, slow)?;
    let macd: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();

    let signal_line = ema_span(&macd, signal)?;
    let histogram = macd.iter().zip(&signal_line).map(|(m, s)| m - s).collect();

    Ok(MacdSeries {
        macd,
        signal: signal_line,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 / 5.0).sin() * 4.0 + i as f64 * 0.1).collect()
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let m = calculate_macd(&wave(200), 12, 26, 9).unwrap();
        for i in 0..200 {
            assert!((m.histogram[i] - (m.macd[i] - m.signal[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn first_bar_is_zero() {
        let m = calculate_macd(&wave(10), 12, 26, 9).unwrap();
        assert_eq!(m.macd[0], 0.0);
        assert_eq!(m.signal[0], 0.0);
        assert_eq!(m.histogram[0], 0.0);
    }

    #[test]
    fn rising_series_has_positive_macd() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let m = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(m.macd[99] > 0.0);
        assert!(m.histogram[99] > 0.0);
    }

    #[test]
    fn fast_must_be_shorter_than_slow() {
        assert!(calculate_macd(&wave(50), 26, 12, 9).is_err());
        assert!(calculate_macd(&wave(50), 12, 12, 9).is_err());
        assert!(calculate_macd(&wave(50), 12, 26, 0).is_err());
    }
}
