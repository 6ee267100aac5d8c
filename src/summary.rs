// =============================================================================
// Summary metrics - headline numbers from an indicator frame and a forecast
// =============================================================================
//
// current      last defined value of the analysed column
// change       % change from the previous defined value, plus the absolute
//              difference
// predicted    yhat of the last forecast row
// slope        (trend[last] - trend[last - 364]) / 365, or 0 when the forecast
//              has 365 rows or fewer
// confidence   max(0, 100 - (upper - lower) / predicted × 100) on the last row,
//              0 when predicted is zero or undefined
//
// Confidence is a normalised interval-width heuristic, not a statistical
// confidence level.

use serde::Serialize;
use tracing::debug;

use crate::error::AnalysisError;
use crate::forecast::ForecastResult;
use crate::indicators::IndicatorFrame;
use crate::types::TrendDirection;

/// Rows spanned by the trend-slope comparison.
pub const TREND_LOOKBACK_ROWS: usize = 365;

/// Undefined values (no previous bar, zero divisor) are NaN and serialise as
/// JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub current_price: f64,
    /// Percent change from the previous defined value.
    pub price_change: f64,
    pub price_change_abs: f64,
    pub predicted_price: f64,
    pub forecast_change: f64,
    pub trend_slope: f64,
    pub trend_direction: TrendDirection,
    pub confidence: f64,
}

pub fn summarize(
    frame: &IndicatorFrame,
    forecast: &ForecastResult,
) -> Result<SummaryMetrics, AnalysisError> {
    let values = frame.values();
    let no_data = || AnalysisError::NoDataFound {
        ticker: frame.series().ticker().to_string(),
    };

    let current_idx = values.iter().rposition(|v| v.is_finite()).ok_or_else(no_data)?;
    let current = values[current_idx];
    let previous = values[..current_idx]
        .iter()
        .rev()
        .copied()
        .find(|v| v.is_finite());

    let (price_change, price_change_abs) = match previous {
        Some(prev) => {
            let change = current - prev;
            (percent(change, prev), change)
        }
        None => (f64::NAN, f64::NAN),
    };

    let last = forecast.last().ok_or(AnalysisError::InsufficientHistory {
        operation: "summary",
        required: 1,
        available: 0,
    })?;
    let predicted = last.yhat;

    let slope = trend_slope(forecast);
    let metrics = SummaryMetrics {
        current_price: current,
        price_change,
        price_change_abs,
        predicted_price: predicted,
        forecast_change: percent(predicted - current, current),
        trend_slope: slope,
        trend_direction: TrendDirection::from_slope(slope),
        confidence: confidence_score(last.yhat_upper, last.yhat_lower, predicted),
    };

    debug!(
        ticker = frame.series().ticker(),
        current = metrics.current_price,
        predicted = metrics.predicted_price,
        direction = %metrics.trend_direction,
        confidence = metrics.confidence,
        "summary computed"
    );
    Ok(metrics)
}

/// Per-row change of the trend component over the last year of rows.
pub fn trend_slope(forecast: &ForecastResult) -> f64 {
    let rows = forecast.rows();
    if rows.len() <= TREND_LOOKBACK_ROWS {
        return 0.0;
    }
    let end = rows[rows.len() - 1].trend;
    let start = rows[rows.len() - TREND_LOOKBACK_ROWS].trend;
    let slope = (end - start) / TREND_LOOKBACK_ROWS as f64;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Interval-width score in `[0, 100]`.
pub fn confidence_score(upper: f64, lower: f64, predicted: f64) -> f64 {
    if predicted == 0.0 || !predicted.is_finite() {
        return 0.0;
    }
    let width = upper - lower;
    let score = 100.0 - width / predicted * 100.0;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn percent(change: f64, base: f64) -> f64 {
    if base == 0.0 {
        f64::NAN
    } else {
        change / base * 100.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastRow;
    use crate::indicators::compute_indicators;
    use crate::market_data::fixtures::{daily_series, start_date};
    use crate::runtime_config::IndicatorConfig;
    use crate::types::PriceColumn;
    use chrono::Days;

    fn frame(closes: &[f64]) -> IndicatorFrame {
        compute_indicators(&daily_series("SUM", closes), PriceColumn::Close, &IndicatorConfig::default())
            .unwrap()
    }

    /// Forecast whose trend rises by `step` per row and whose last row has the
    /// given prediction and bounds.
    fn forecast(rows: usize, step: f64, yhat: f64, lower: f64, upper: f64) -> ForecastResult {
        let rows: Vec<ForecastRow> = (0..rows)
            .map(|i| ForecastRow {
                ds: start_date().checked_add_days(Days::new(i as u64)).unwrap(),
                yhat,
                yhat_lower: lower,
                yhat_upper: upper,
                trend: 50.0 + step * i as f64,
                yearly: 0.0,
                weekly: 0.0,
            })
            .collect();
        ForecastResult::new(rows, 0, 1.0, 1, true)
    }

    #[test]
    fn confidence_from_interval_width() {
        assert_eq!(confidence_score(110.0, 90.0, 100.0), 80.0);
        assert_eq!(confidence_score(300.0, 0.0, 100.0), 0.0);
        assert_eq!(confidence_score(110.0, 90.0, 0.0), 0.0);
        assert_eq!(confidence_score(110.0, 90.0, f64::NAN), 0.0);
    }

    #[test]
    fn headline_numbers() {
        let metrics = summarize(&frame(&[100.0, 95.0, 100.0]), &forecast(400, 0.1, 100.0, 90.0, 110.0))
            .unwrap();
        assert_eq!(metrics.current_price, 100.0);
        assert!((metrics.price_change - 5.0 / 95.0 * 100.0).abs() < 1e-12);
        assert_eq!(metrics.price_change_abs, 5.0);
        assert_eq!(metrics.predicted_price, 100.0);
        assert_eq!(metrics.forecast_change, 0.0);
        assert_eq!(metrics.confidence, 80.0);
    }

    #[test]
    fn rising_trend_is_bullish() {
        let metrics = summarize(&frame(&[10.0, 11.0]), &forecast(730, 0.5, 12.0, 11.0, 13.0)).unwrap();
        // 364 steps of 0.5 spread over 365 rows.
        assert!((metrics.trend_slope - 0.5 * 364.0 / 365.0).abs() < 1e-12);
        assert_eq!(metrics.trend_direction, TrendDirection::Bullish);
    }

    #[test]
    fn falling_trend_is_bearish() {
        let metrics = summarize(&frame(&[10.0, 9.0]), &forecast(500, -0.2, 8.0, 7.0, 9.0)).unwrap();
        assert!(metrics.trend_slope < 0.0);
        assert_eq!(metrics.trend_direction, TrendDirection::Bearish);
    }

    #[test]
    fn short_forecast_falls_back_to_zero_slope() {
        let metrics = summarize(&frame(&[10.0, 11.0]), &forecast(365, 1.0, 12.0, 11.0, 13.0)).unwrap();
        assert_eq!(metrics.trend_slope, 0.0);
        assert_eq!(metrics.trend_direction, TrendDirection::Bearish);
    }

    #[test]
    fn single_value_has_no_change() {
        let metrics = summarize(&frame(&[42.0]), &forecast(10, 0.0, 40.0, 39.0, 41.0)).unwrap();
        assert_eq!(metrics.current_price, 42.0);
        assert!(metrics.price_change.is_nan());
        assert!(metrics.price_change_abs.is_nan());
    }

    #[test]
    fn trailing_gap_uses_last_defined_values() {
        let mut series = daily_series("GAP", &[10.0, 20.0, 30.0]);
        let mut bars = series.bars().to_vec();
        bars[2].close = None;
        bars[2].adj_close = None;
        series = crate::market_data::PriceSeries::new("GAP", bars).unwrap();
        let frame = compute_indicators(&series, PriceColumn::Close, &IndicatorConfig::default()).unwrap();
        let metrics = summarize(&frame, &forecast(10, 0.0, 25.0, 24.0, 26.0)).unwrap();
        assert_eq!(metrics.current_price, 20.0);
        assert_eq!(metrics.price_change, 100.0);
        assert_eq!(metrics.price_change_abs, 10.0);
    }

    #[test]
    fn zero_current_price_leaves_forecast_change_undefined() {
        let metrics = summarize(&frame(&[1.0, 0.0]), &forecast(10, 0.0, 5.0, 4.0, 6.0)).unwrap();
        assert!(metrics.forecast_change.is_nan());
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json["forecast_change"].is_null());
    }

    #[test]
    fn price_change_is_a_percent_on_the_wire() {
        let metrics = summarize(&frame(&[200.0, 202.0]), &forecast(10, 0.0, 202.0, 201.0, 203.0)).unwrap();
        let json = serde_json::to_value(&metrics).unwrap();
        assert!((json["price_change"].as_f64().unwrap() - 1.0).abs() < 1e-12);
        assert!((json["price_change_abs"].as_f64().unwrap() - 2.0).abs() < 1e-12);
        assert!(json.get("price_change_pct").is_none());
    }

    #[test]
    fn empty_frame_is_no_data() {
        let err = summarize(&frame(&[]), &forecast(10, 0.0, 5.0, 4.0, 6.0)).unwrap_err();
        assert_eq!(err.kind(), "no_data_found");
    }
}
