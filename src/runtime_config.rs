// =============================================================================
// Runtime Configuration - service settings and analysis parameters
// =============================================================================
//
// Every tunable lives here and is handed explicitly to the pipeline; nothing
// is read from globals at analysis time. All fields carry `#[serde(default)]`
// so that a partial (or absent) JSON file still yields a complete config.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnalysisError;
use crate::types::{PriceColumn, SeasonalityMode};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn default_forecast_years() -> u32 {
    1
}

fn default_max_forecast_years() -> u32 {
    10
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_num_std() -> f64 {
    2.0
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_changepoint_prior_scale() -> f64 {
    0.05
}

fn default_n_changepoints() -> usize {
    25
}

fn default_changepoint_range() -> f64 {
    0.8
}

fn default_seasonality_prior_scale() -> f64 {
    10.0
}

fn default_yearly_fourier_order() -> usize {
    10
}

fn default_weekly_fourier_order() -> usize {
    3
}

fn default_interval_width() -> f64 {
    0.80
}

fn default_uncertainty_samples() -> usize {
    1000
}

fn default_seed() -> u64 {
    0x5eed_f0ca_57
}

fn default_min_history() -> usize {
    100
}

fn default_max_iterations() -> usize {
    200
}

fn default_tolerance() -> f64 {
    1e-6
}

// =============================================================================
// ProviderConfig
// =============================================================================

/// Market-data provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP timeout per request, seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// First date requested when an analysis asks for the full history.
    #[serde(default = "default_history_start")]
    pub history_start: NaiveDate,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            history_start: default_history_start(),
        }
    }
}

// =============================================================================
// IndicatorConfig
// =============================================================================

/// Periods for the derived indicator columns. Moving-average windows are fixed
/// (20/50/200) because they name output columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    /// Band half-width in standard deviations.
    #[serde(default = "default_bollinger_num_std")]
    pub bollinger_num_std: f64,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            bollinger_period: default_bollinger_period(),
            bollinger_num_std: default_bollinger_num_std(),
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("bollinger_period", self.bollinger_period),
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ] {
            if value == 0 {
                return Err(AnalysisError::invalid(name, "must be a positive integer, got 0"));
            }
        }
        if !(self.bollinger_num_std.is_finite() && self.bollinger_num_std >= 0.0) {
            return Err(AnalysisError::invalid(
                "bollinger_num_std",
                format!("must be finite and non-negative, got {}", self.bollinger_num_std),
            ));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(AnalysisError::invalid(
                "macd_fast",
                format!(
                    "must be shorter than macd_slow ({} >= {})",
                    self.macd_fast, self.macd_slow
                ),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// ForecastConfig
// =============================================================================

/// Trend + seasonality model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub seasonality_mode: SeasonalityMode,

    /// Laplace scale of trend rate changes; larger bends the trend more.
    #[serde(default = "default_changepoint_prior_scale")]
    pub changepoint_prior_scale: f64,

    #[serde(default = "default_n_changepoints")]
    pub n_changepoints: usize,

    /// Fraction of the history in which changepoints may be placed.
    #[serde(default = "default_changepoint_range")]
    pub changepoint_range: f64,

    /// Gaussian scale of the Fourier coefficients.
    #[serde(default = "default_seasonality_prior_scale")]
    pub seasonality_prior_scale: f64,

    #[serde(default = "default_yearly_fourier_order")]
    pub yearly_fourier_order: usize,

    #[serde(default = "default_weekly_fourier_order")]
    pub weekly_fourier_order: usize,

    /// Coverage of the `[yhat_lower, yhat_upper]` interval.
    #[serde(default = "default_interval_width")]
    pub interval_width: f64,

    /// Monte-Carlo draws for the interval; 0 collapses it onto `yhat`.
    #[serde(default = "default_uncertainty_samples")]
    pub uncertainty_samples: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fewest cleaned observations the fit accepts.
    #[serde(default = "default_min_history")]
    pub min_history: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Relative objective change that counts as converged.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            seasonality_mode: SeasonalityMode::default(),
            changepoint_prior_scale: default_changepoint_prior_scale(),
            n_changepoints: default_n_changepoints(),
            changepoint_range: default_changepoint_range(),
            seasonality_prior_scale: default_seasonality_prior_scale(),
            yearly_fourier_order: default_yearly_fourier_order(),
            weekly_fourier_order: default_weekly_fourier_order(),
            interval_width: default_interval_width(),
            uncertainty_samples: default_uncertainty_samples(),
            seed: default_seed(),
            min_history: default_min_history(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let positive = |name: &'static str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(AnalysisError::invalid(name, format!("must be finite and positive, got {v}")))
            }
        };
        positive("changepoint_prior_scale", self.changepoint_prior_scale)?;
        positive("seasonality_prior_scale", self.seasonality_prior_scale)?;
        positive("tolerance", self.tolerance)?;

        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(AnalysisError::invalid(
                "changepoint_range",
                format!("must lie in (0, 1], got {}", self.changepoint_range),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(AnalysisError::invalid(
                "interval_width",
                format!("must lie in (0, 1), got {}", self.interval_width),
            ));
        }
        if self.min_history < 2 {
            return Err(AnalysisError::invalid(
                "min_history",
                format!("must be at least 2, got {}", self.min_history),
            ));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::invalid("max_iterations", "must be positive, got 0"));
        }
        Ok(())
    }
}

// =============================================================================
// ReportOptions
// =============================================================================

/// Which optional sections an analysis report carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Attach indicator columns to historical records.
    #[serde(default = "default_true")]
    pub include_indicators: bool,

    /// Attach trend / yearly / weekly components to forecast records.
    #[serde(default)]
    pub include_components: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_indicators: true,
            include_components: false,
        }
    }
}

// =============================================================================
// AnalysisConfig
// =============================================================================

/// Everything one pipeline invocation needs besides the request itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub default_price_column: PriceColumn,

    #[serde(default = "default_forecast_years")]
    pub default_forecast_years: u32,

    /// Upper bound on requested horizons.
    #[serde(default = "default_max_forecast_years")]
    pub max_forecast_years: u32,

    #[serde(default)]
    pub indicators: IndicatorConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub report: ReportOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_price_column: PriceColumn::default(),
            default_forecast_years: default_forecast_years(),
            max_forecast_years: default_max_forecast_years(),
            indicators: IndicatorConfig::default(),
            forecast: ForecastConfig::default(),
            report: ReportOptions::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_forecast_years == 0 {
            return Err(AnalysisError::invalid("max_forecast_years", "must be positive, got 0"));
        }
        if self.default_forecast_years == 0 || self.default_forecast_years > self.max_forecast_years {
            return Err(AnalysisError::invalid(
                "default_forecast_years",
                format!(
                    "must lie in 1..={}, got {}",
                    self.max_forecast_years, self.default_forecast_years
                ),
            ));
        }
        self.indicators.validate()?;
        self.forecast.validate()
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Top-level configuration for the stock-insight service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            provider: ProviderConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        config
            .analysis
            .validate()
            .with_context(|| format!("invalid analysis settings in {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            provider = %config.provider.base_url,
            "config loaded"
        );

        Ok(config)
    }
}
