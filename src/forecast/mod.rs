// =============================================================================
// Forecast Engine - additive/multiplicative trend + seasonality model
// =============================================================================
//
// Fits a piecewise-linear trend with automatic changepoints plus yearly and
// weekly Fourier seasonality to a single price column, then projects it
// `horizon_years × 365` calendar days past the last observation with
// Monte-Carlo prediction intervals.
//
// Output covers every historical date (fitted values) followed by one row per
// future day, ascending and gap-free in the future part.

pub mod linalg;
pub mod model;
pub mod result;
pub mod seasonality;
pub mod trend;
pub mod uncertainty;

use chrono::{Days, NaiveDate};
use tracing::{debug, instrument};

use crate::error::AnalysisError;
use crate::market_data::PriceSeries;
use crate::runtime_config::ForecastConfig;
use crate::types::{PriceColumn, SeasonalityMode};

use self::model::{fit, TrainingSet};
use self::seasonality::{block_effect, SeasonalLayout};
use self::trend::changepoints;
use self::uncertainty::{prediction_intervals, IntervalSettings, PointForecast};

pub use self::result::{ForecastResult, ForecastRow};

pub const DAYS_PER_FORECAST_YEAR: u64 = 365;
const MIN_YEARLY_SPAN_DAYS: f64 = 730.0;
const MIN_WEEKLY_SPAN_DAYS: f64 = 14.0;

/// Fit the model on `column` of `series` and forecast `horizon_years` ahead.
///
/// Rows with no value in `column` are dropped before fitting. Fewer than
/// `config.min_history` remaining points is `InsufficientHistory`.
#[instrument(skip_all, fields(ticker = series.ticker(), column = %column, horizon_years = horizon_years))]
pub fn forecast(
    series: &PriceSeries,
    column: PriceColumn,
    horizon_years: u32,
    config: &ForecastConfig,
) -> Result<ForecastResult, AnalysisError> {
    config.validate()?;
    if horizon_years == 0 {
        return Err(AnalysisError::invalid("horizon_years", "must be at least 1"));
    }

    let observations: Vec<(NaiveDate, f64)> = series
        .observations(column)
        .into_iter()
        .filter(|(_, v)| v.is_finite())
        .collect();
    let n = observations.len();
    if n < config.min_history {
        return Err(AnalysisError::InsufficientHistory {
            operation: "forecast",
            required: config.min_history,
            available: n,
        });
    }

    let dates: Vec<NaiveDate> = observations.iter().map(|(d, _)| *d).collect();
    let scale = Scaling::new(&observations);
    let t: Vec<f64> = dates.iter().map(|&d| scale.time(d)).collect();
    let y: Vec<f64> = observations.iter().map(|(_, v)| v / scale.y_scale).collect();

    let layout = seasonal_layout(scale.span_days, config);
    let features = layout.matrix(&dates);
    let data = TrainingSet {
        t: &t,
        y: &y,
        features: &features,
        changepoints: changepoints(&t, config.n_changepoints, config.changepoint_range),
    };
    let model = fit(&data, config)?;

    let future = future_dates(scale.end, horizon_years)?;
    let all_dates: Vec<NaiveDate> = dates.iter().copied().chain(future).collect();

    let mut points = Vec::with_capacity(all_dates.len());
    let mut effects = Vec::with_capacity(all_dates.len());
    for &date in &all_dates {
        let x = layout.features(date);
        let t = scale.time(date);
        let block = |name: &str| {
            layout
                .block(name)
                .map_or(0.0, |b| block_effect(b, &x, &model.beta))
        };
        effects.push((block("yearly"), block("weekly")));
        points.push(PointForecast {
            t,
            trend: model.trend.eval(t),
            seasonal: model.seasonal(&x),
        });
    }

    let bounds = prediction_intervals(
        &points,
        &model.trend,
        &IntervalSettings {
            mode: model.mode,
            sigma: model.sigma,
            y_scale: scale.y_scale,
            width: config.interval_width,
            samples: config.uncertainty_samples,
            seed: config.seed,
        },
    );

    let component_scale = match model.mode {
        SeasonalityMode::Multiplicative => 1.0,
        SeasonalityMode::Additive => scale.y_scale,
    };
    let rows: Vec<ForecastRow> = all_dates
        .iter()
        .zip(&points)
        .zip(effects.iter().zip(&bounds))
        .map(|((&ds, p), (&(yearly, weekly), &(lower, upper)))| {
            let yhat = p.yhat(model.mode) * scale.y_scale;
            ForecastRow {
                ds,
                yhat,
                yhat_lower: lower.min(yhat),
                yhat_upper: upper.max(yhat),
                trend: p.trend * scale.y_scale,
                yearly: yearly * component_scale,
                weekly: weekly * component_scale,
            }
        })
        .collect();

    debug!(
        history = n,
        rows = rows.len(),
        iterations = model.iterations,
        converged = model.converged,
        final_rate = model.trend.final_rate(),
        "forecast complete"
    );

    Ok(ForecastResult::new(
        rows,
        n,
        model.sigma * scale.y_scale,
        model.iterations,
        model.converged,
    ))
}

/// Maps calendar dates onto rescaled model time and values onto unit scale.
#[derive(Debug, Clone, Copy)]
struct Scaling {
    start: NaiveDate,
    end: NaiveDate,
    span_days: f64,
    y_scale: f64,
}

impl Scaling {
    fn new(observations: &[(NaiveDate, f64)]) -> Self {
        let start = observations.first().map(|(d, _)| *d).unwrap_or_default();
        let end = observations.last().map(|(d, _)| *d).unwrap_or(start);
        let span_days = ((end - start).num_days() as f64).max(1.0);
        let max_abs = observations.iter().map(|(_, v)| v.abs()).fold(0.0_f64, f64::max);
        Self {
            start,
            end,
            span_days,
            y_scale: if max_abs > 0.0 { max_abs } else { 1.0 },
        }
    }

    fn time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }
}

/// Yearly terms need two full cycles of history and weekly terms two weeks;
/// shorter histories would let the Fourier terms soak up the trend.
fn seasonal_layout(span_days: f64, config: &ForecastConfig) -> SeasonalLayout {
    let yearly = if span_days >= MIN_YEARLY_SPAN_DAYS {
        config.yearly_fourier_order
    } else {
        0
    };
    let weekly = if span_days >= MIN_WEEKLY_SPAN_DAYS {
        config.weekly_fourier_order
    } else {
        0
    };
    debug!(span_days, yearly, weekly, "seasonality orders");
    SeasonalLayout::new(yearly, weekly)
}

fn future_dates(last: NaiveDate, horizon_years: u32) -> Result<Vec<NaiveDate>, AnalysisError> {
    let days = horizon_years as u64 * DAYS_PER_FORECAST_YEAR;
    (1..=days)
        .map(|i| {
            last.checked_add_days(Days::new(i))
                .ok_or_else(|| AnalysisError::invalid("horizon_years", "forecast runs past the calendar"))
        })
        .collect()
}
