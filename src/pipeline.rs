// =============================================================================
// Analysis Pipeline - indicators + forecast + summary for one ticker
// =============================================================================
//
// One request runs start to finish on its own data: the fetched series, the
// indicator frame, the forecast and the summary are all owned by the call.
// Nothing is cached or shared between requests.
//
//   fetch (async, provider)  ─▶  analyze (sync, CPU-bound)
//                                  ├─ compute_indicators
//                                  ├─ forecast
//                                  └─ summarize
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::forecast::{forecast, ForecastRow};
use crate::indicators::{compute_indicators, IndicatorFrame, IndicatorRow};
use crate::market_data::{HistoryRange, MarketDataProvider, PriceSeries};
use crate::runtime_config::AnalysisConfig;
use crate::summary::{summarize, SummaryMetrics};
use crate::types::PriceColumn;

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub price_column: PriceColumn,
    pub forecast_years: u32,
}

impl AnalysisRequest {
    /// Request for `ticker` using the configured column and horizon.
    pub fn with_defaults(ticker: impl Into<String>, config: &AnalysisConfig) -> Self {
        Self {
            ticker: ticker.into(),
            price_column: config.default_price_column,
            forecast_years: config.default_forecast_years,
        }
    }

    pub fn validate(&self, config: &AnalysisConfig) -> Result<(), AnalysisError> {
        if self.ticker.trim().is_empty() {
            return Err(AnalysisError::invalid("ticker", "must not be empty"));
        }
        if self.forecast_years == 0 || self.forecast_years > config.max_forecast_years {
            return Err(AnalysisError::invalid(
                "forecast_years",
                format!(
                    "must lie in 1..={}, got {}",
                    config.max_forecast_years, self.forecast_years
                ),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Report records
// =============================================================================

/// One historical bar with its indicator columns. Undefined values serialise
/// as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: Option<f64>,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    pub volume: Option<f64>,
    #[serde(flatten)]
    pub indicators: Option<IndicatorValues>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorValues {
    #[serde(rename = "MA_20")]
    pub ma_20: f64,
    #[serde(rename = "MA_50")]
    pub ma_50: f64,
    #[serde(rename = "MA_200")]
    pub ma_200: f64,
    #[serde(rename = "BB_Middle")]
    pub bb_middle: f64,
    #[serde(rename = "BB_Upper")]
    pub bb_upper: f64,
    #[serde(rename = "BB_Lower")]
    pub bb_lower: f64,
    #[serde(rename = "RSI")]
    pub rsi: f64,
    #[serde(rename = "MACD")]
    pub macd: f64,
    #[serde(rename = "MACD_Signal")]
    pub macd_signal: f64,
    #[serde(rename = "MACD_Hist")]
    pub macd_hist: f64,
}

impl HistoricalRecord {
    fn from_row(row: IndicatorRow<'_>, include_indicators: bool) -> Self {
        let bar = row.bar;
        Self {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close: bar.adj_close,
            volume: bar.volume,
            indicators: include_indicators.then(|| IndicatorValues {
                ma_20: row.ma_20,
                ma_50: row.ma_50,
                ma_200: row.ma_200,
                bb_middle: row.bb_middle,
                bb_upper: row.bb_upper,
                bb_lower: row.bb_lower,
                rsi: row.rsi,
                macd: row.macd,
                macd_signal: row.macd_signal,
                macd_hist: row.macd_hist,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRecord {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    #[serde(flatten)]
    pub components: Option<ForecastComponents>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastComponents {
    pub trend: f64,
    pub yearly: f64,
    pub weekly: f64,
}

impl ForecastRecord {
    fn from_row(row: &ForecastRow, include_components: bool) -> Self {
        Self {
            ds: row.ds,
            yhat: row.yhat,
            yhat_lower: row.yhat_lower,
            yhat_upper: row.yhat_upper,
            components: include_components.then(|| ForecastComponents {
                trend: row.trend,
                yearly: row.yearly,
                weekly: row.weekly,
            }),
        }
    }
}

/// Everything one analysis produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub ticker: String,
    pub price_column: PriceColumn,
    pub forecast_years: u32,
    pub generated_at: DateTime<Utc>,
    pub historical_data: Vec<HistoricalRecord>,
    /// Future rows only.
    pub forecast_data: Vec<ForecastRecord>,
    pub metrics: SummaryMetrics,
}

// =============================================================================
// Entry points
// =============================================================================

/// Run indicators, forecast and summary over an already-fetched series.
pub fn analyze(
    series: &PriceSeries,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalysisError> {
    config.validate()?;
    request.validate(config)?;

    let analysis_id = Uuid::new_v4();
    let span = info_span!(
        "analysis",
        %analysis_id,
        ticker = %request.ticker,
        column = %request.price_column,
        years = request.forecast_years
    );
    let _enter = span.enter();

    if series.is_empty() {
        return Err(AnalysisError::NoDataFound {
            ticker: request.ticker.clone(),
        });
    }

    let frame = compute_indicators(series, request.price_column, &config.indicators)?;
    let projection = forecast(
        series,
        request.price_column,
        request.forecast_years,
        &config.forecast,
    )?;
    let metrics = summarize(&frame, &projection)?;

    let report = AnalysisReport {
        analysis_id,
        ticker: request.ticker.clone(),
        price_column: request.price_column,
        forecast_years: request.forecast_years,
        generated_at: Utc::now(),
        historical_data: historical_records(&frame, config.report.include_indicators),
        forecast_data: projection
            .future()
            .iter()
            .map(|row| ForecastRecord::from_row(row, config.report.include_components))
            .collect(),
        metrics,
    };

    info!(
        bars = report.historical_data.len(),
        forecast_rows = report.forecast_data.len(),
        direction = %report.metrics.trend_direction,
        confidence = report.metrics.confidence,
        sigma = projection.sigma,
        iterations = projection.iterations,
        converged = projection.converged,
        "analysis complete"
    );
    Ok(report)
}

/// Fetch the series for `request` and analyse it on the blocking pool.
pub async fn run(
    provider: &dyn MarketDataProvider,
    range: HistoryRange,
    request: AnalysisRequest,
    config: AnalysisConfig,
) -> Result<AnalysisReport, AnalysisError> {
    request.validate(&config)?;
    let series = provider.fetch_history(&request.ticker, range).await?;

    tokio::task::spawn_blocking(move || analyze(&series, &request, &config))
        .await
        .map_err(|e| AnalysisError::ComputationFailure {
            stage: "analysis task",
            reason: e.to_string(),
        })?
}

/// Historical records for a frame, optionally with indicator columns.
pub fn historical_records(frame: &IndicatorFrame, include_indicators: bool) -> Vec<HistoricalRecord> {
    frame
        .rows()
        .map(|row| HistoricalRecord::from_row(row, include_indicators))
        .collect()
}
