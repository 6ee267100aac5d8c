// =============================================================================
// Tool calls - typed indicator operations for the chat front end
// =============================================================================
//
// A chat-completion layer picks one of these operations by name and supplies
// JSON arguments. Each call fetches its own history from the market-data
// provider, computes one indicator, and returns a JSON-serialisable value.
// The set is closed: an unknown name or a malformed argument object is an
// `InvalidParameter` error, never a runtime lookup miss.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::AnalysisError;
use crate::indicators::ema::ema_span;
use crate::indicators::macd::calculate_macd;
use crate::indicators::rsi::{calculate_rsi, rsi_zone};
use crate::indicators::sma::{check_window, last_defined, rolling_mean};
use crate::market_data::{HistoryRange, MarketDataProvider, PriceSeries};
use crate::runtime_config::IndicatorConfig;
use crate::types::{LookbackPeriod, PriceColumn};

/// History window used by the single-ticker indicator tools.
const INDICATOR_LOOKBACK: LookbackPeriod = LookbackPeriod::OneYear;
/// History window for daily returns.
const RETURNS_LOOKBACK: LookbackPeriod = LookbackPeriod::OneMonth;

/// Wire names of every supported tool, in definition order.
pub const TOOL_NAMES: [&str; 8] = [
    "get_stock_price",
    "calculate_SMA",
    "calculate_EMA",
    "calculate_RSI",
    "calculate_MACD",
    "compare_stock_prices",
    "average_volume",
    "calculate_daily_returns",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum ToolCall {
    #[serde(rename = "get_stock_price")]
    StockPrice { ticker: String },

    #[serde(rename = "calculate_SMA")]
    Sma { ticker: String, window: usize },

    #[serde(rename = "calculate_EMA")]
    Ema { ticker: String, window: usize },

    #[serde(rename = "calculate_RSI")]
    Rsi { ticker: String },

    #[serde(rename = "calculate_MACD")]
    Macd { ticker: String },

    #[serde(rename = "compare_stock_prices")]
    ComparePrices {
        ticker1: String,
        ticker2: String,
        period: LookbackPeriod,
    },

    #[serde(rename = "average_volume")]
    AverageVolume {
        ticker: String,
        period: LookbackPeriod,
    },

    #[serde(rename = "calculate_daily_returns")]
    DailyReturns { ticker: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Value(f64),
    Rsi {
        rsi: f64,
        zone: &'static str,
    },
    Macd {
        macd: f64,
        signal: f64,
        histogram: f64,
    },
    /// One entry per requested ticker, in argument order.
    Comparison(Vec<TickerCloses>),
    /// Fractional change per date (0.01 for a 1% move); the first date has no
    /// previous close.
    Returns(BTreeMap<NaiveDate, Option<f64>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerCloses {
    pub ticker: String,
    pub closes: Vec<f64>,
}

impl ToolCall {
    /// Decode a call from a function name and its JSON-encoded argument
    /// string, the shape chat-completion APIs hand back.
    pub fn from_function_call(name: &str, arguments: &str) -> Result<Self, AnalysisError> {
        let args: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| AnalysisError::invalid("arguments", e.to_string()))?
        };
        Self::from_value(json!({ "name": name, "arguments": args }))
    }

    pub fn from_value(value: Value) -> Result<Self, AnalysisError> {
        serde_json::from_value(value).map_err(|e| AnalysisError::invalid("tool_call", e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StockPrice { .. } => "get_stock_price",
            Self::Sma { .. } => "calculate_SMA",
            Self::Ema { .. } => "calculate_EMA",
            Self::Rsi { .. } => "calculate_RSI",
            Self::Macd { .. } => "calculate_MACD",
            Self::ComparePrices { .. } => "compare_stock_prices",
            Self::AverageVolume { .. } => "average_volume",
            Self::DailyReturns { .. } => "calculate_daily_returns",
        }
    }

    #[instrument(skip_all, fields(tool = self.name()))]
    pub async fn execute(
        &self,
        provider: &dyn MarketDataProvider,
        config: &IndicatorConfig,
    ) -> Result<ToolOutput, AnalysisError> {
        let output = match self {
            Self::StockPrice { ticker } => {
                let closes = closes(provider, ticker, INDICATOR_LOOKBACK).await?;
                ToolOutput::Value(last_value(self.name(), &closes, 1)?)
            }
            Self::Sma { ticker, window } => {
                check_window("window", *window)?;
                let closes = closes(provider, ticker, INDICATOR_LOOKBACK).await?;
                let sma = rolling_mean(&closes, *window)?;
                ToolOutput::Value(last_value(self.name(), &sma, *window)?)
            }
            Self::Ema { ticker, window } => {
                check_window("window", *window)?;
                let closes = closes(provider, ticker, INDICATOR_LOOKBACK).await?;
                let ema = ema_span(&closes, *window)?;
                ToolOutput::Value(last_value(self.name(), &ema, 1)?)
            }
            Self::Rsi { ticker } => {
                let closes = closes(provider, ticker, INDICATOR_LOOKBACK).await?;
                let rsi = calculate_rsi(&closes, config.rsi_period)?;
                let value = last_value(self.name(), &rsi, 2)?;
                ToolOutput::Rsi {
                    rsi: value,
                    zone: rsi_zone(value),
                }
            }
            Self::Macd { ticker } => {
                let closes = closes(provider, ticker, INDICATOR_LOOKBACK).await?;
                let m = calculate_macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal)?;
                ToolOutput::Macd {
                    macd: last_value(self.name(), &m.macd, 1)?,
                    signal: last_value(self.name(), &m.signal, 1)?,
                    histogram: last_value(self.name(), &m.histogram, 1)?,
                }
            }
            Self::ComparePrices {
                ticker1,
                ticker2,
                period,
            } => {
                let (first, second) = tokio::try_join!(
                    closes(provider, ticker1, *period),
                    closes(provider, ticker2, *period)
                )?;
                ToolOutput::Comparison(vec![
                    TickerCloses {
                        ticker: ticker1.clone(),
                        closes: first,
                    },
                    TickerCloses {
                        ticker: ticker2.clone(),
                        closes: second,
                    },
                ])
            }
            Self::AverageVolume { ticker, period } => {
                let series = fetch(provider, ticker, *period).await?;
                let volumes: Vec<f64> = defined(&series, PriceColumn::Volume);
                if volumes.is_empty() {
                    return Err(AnalysisError::NoDataFound {
                        ticker: ticker.clone(),
                    });
                }
                ToolOutput::Value(volumes.iter().sum::<f64>() / volumes.len() as f64)
            }
            Self::DailyReturns { ticker } => {
                let series = fetch(provider, ticker, RETURNS_LOOKBACK).await?;
                ToolOutput::Returns(daily_returns(&series))
            }
        };
        debug!(tool = self.name(), "tool executed");
        Ok(output)
    }
}

async fn fetch(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    period: LookbackPeriod,
) -> Result<PriceSeries, AnalysisError> {
    provider.fetch_history(ticker, HistoryRange::Lookback(period)).await
}

async fn closes(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    period: LookbackPeriod,
) -> Result<Vec<f64>, AnalysisError> {
    let series = fetch(provider, ticker, period).await?;
    let closes = defined(&series, PriceColumn::Close);
    if closes.is_empty() {
        return Err(AnalysisError::NoDataFound {
            ticker: ticker.to_string(),
        });
    }
    Ok(closes)
}

fn defined(series: &PriceSeries, column: PriceColumn) -> Vec<f64> {
    series
        .observations(column)
        .into_iter()
        .map(|(_, v)| v)
        .collect()
}

fn last_value(operation: &'static str, values: &[f64], required: usize) -> Result<f64, AnalysisError> {
    last_defined(values).ok_or(AnalysisError::InsufficientHistory {
        operation,
        required,
        available: values.len(),
    })
}

/// Fractional change of the adjusted close from one bar to the next.
pub fn daily_returns(series: &PriceSeries) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut out = BTreeMap::new();
    let mut previous: Option<f64> = None;
    for bar in series.bars() {
        let current = bar.value(PriceColumn::AdjClose);
        let ret = match (previous, current) {
            (Some(p), Some(c)) if p != 0.0 => Some((c - p) / p),
            _ => None,
        };
        out.insert(bar.date, ret);
        previous = current;
    }
    out
}

/// JSON function schemas advertised to the chat-completion layer.
pub fn tool_definitions() -> Value {
    let ticker = json!({
        "type": "string",
        "description": "The stock ticker symbol for a company (for example AAPL for Apple)."
    });
    let period = json!({
        "type": "string",
        "description": "Lookback period such as 1mo, 6mo, 1y or max.",
        "enum": ["1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max"]
    });
    let window = json!({
        "type": "integer",
        "minimum": 1,
        "description": "The timeframe to consider when calculating the average, in trading days."
    });

    let single = |name: &str, description: &str| {
        json!({
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": { "ticker": ticker },
                "required": ["ticker"]
            }
        })
    };
    let windowed = |name: &str, description: &str| {
        json!({
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": { "ticker": ticker, "window": window },
                "required": ["ticker", "window"]
            }
        })
    };

    json!([
        single("get_stock_price", "Gets the latest stock price given the ticker symbol of a company."),
        windowed("calculate_SMA", "Calculate the simple moving average for a given stock ticker and a window."),
        windowed("calculate_EMA", "Calculate the exponential moving average for a given stock ticker and a window."),
        single("calculate_RSI", "Calculate the RSI for a given stock ticker."),
        single("calculate_MACD", "Calculate the MACD for a given stock ticker."),
        {
            "name": "compare_stock_prices",
            "description": "Compare the closing prices of two stocks over a given period.",
            "parameters": {
                "type": "object",
                "properties": { "ticker1": ticker, "ticker2": ticker, "period": period },
                "required": ["ticker1", "ticker2", "period"]
            }
        },
        {
            "name": "average_volume",
            "description": "Calculate the average trading volume of a stock over a given period.",
            "parameters": {
                "type": "object",
                "properties": { "ticker": ticker, "period": period },
                "required": ["ticker", "period"]
            }
        },
        single("calculate_daily_returns", "Calculate the daily returns of a stock over the last month as fractional changes (0.01 is a 1% move)."),
    ])
}
