use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AnalysisError;
use crate::market_data::PriceSeries;
use crate::types::LookbackPeriod;

/// How much history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    /// Every daily bar from `start` up to today.
    Since(NaiveDate),
    /// A provider-style lookback ending today ("1y", "max", ...).
    Lookback(LookbackPeriod),
}

impl std::fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Since(start) => write!(f, "since {start}"),
            Self::Lookback(period) => write!(f, "{period}"),
        }
    }
}

/// Source of daily OHLCV history.
///
/// Implementations return a validated [`PriceSeries`] or
/// [`AnalysisError::NoDataFound`] when the ticker has no bars in range.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<PriceSeries, AnalysisError>;
}
