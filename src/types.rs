// =============================================================================
// Shared types used across the stock-insight service
// =============================================================================

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Which OHLCV field an analysis runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceColumn {
    Open,
    High,
    Low,
    Close,
    #[serde(rename = "Adj Close")]
    AdjClose,
    Volume,
}

impl Default for PriceColumn {
    fn default() -> Self {
        Self::Close
    }
}

impl std::fmt::Display for PriceColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::High => write!(f, "High"),
            Self::Low => write!(f, "Low"),
            Self::Close => write!(f, "Close"),
            Self::AdjClose => write!(f, "Adj Close"),
            Self::Volume => write!(f, "Volume"),
        }
    }
}

impl std::str::FromStr for PriceColumn {
    type Err = AnalysisError;

    /// Accepts the provider's column labels case-insensitively, with or
    /// without the space/underscore in "Adj Close".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_lowercase();

        match normalised.as_str() {
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "close" => Ok(Self::Close),
            "adjclose" => Ok(Self::AdjClose),
            "volume" => Ok(Self::Volume),
            _ => Err(AnalysisError::InvalidParameter {
                name: "column",
                reason: format!("unknown price column '{s}'"),
            }),
        }
    }
}

/// Direction of the long-run forecast trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Bullish,
    Bearish,
}

impl TrendDirection {
    /// Strictly positive slope is bullish; flat or falling is bearish.
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            Self::Bullish
        } else {
            Self::Bearish
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

/// How seasonal effects combine with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// `y = trend + seasonal`
    Additive,
    /// `y = trend * (1 + seasonal)`
    Multiplicative,
}

impl Default for SeasonalityMode {
    fn default() -> Self {
        Self::Multiplicative
    }
}

// =============================================================================
// LookbackPeriod
// =============================================================================

/// Lookback windows understood by the market-data provider ("1y", "max", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookbackPeriod {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "max")]
    Max,
}

impl LookbackPeriod {
    /// Provider wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }

    /// First calendar date covered by this lookback when it ends at `end`.
    /// `None` means "all available history".
    pub fn start_from(&self, end: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::OneDay => end.checked_sub_days(Days::new(1)),
            Self::FiveDays => end.checked_sub_days(Days::new(5)),
            Self::OneMonth => end.checked_sub_months(Months::new(1)),
            Self::ThreeMonths => end.checked_sub_months(Months::new(3)),
            Self::SixMonths => end.checked_sub_months(Months::new(6)),
            Self::OneYear => end.checked_sub_months(Months::new(12)),
            Self::TwoYears => end.checked_sub_months(Months::new(24)),
            Self::FiveYears => end.checked_sub_months(Months::new(60)),
            Self::TenYears => end.checked_sub_months(Months::new(120)),
            Self::YearToDate => NaiveDate::from_ymd_opt(end.year(), 1, 1),
            Self::Max => None,
        }
    }
}

impl std::fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LookbackPeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(Self::OneDay),
            "5d" => Ok(Self::FiveDays),
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            "5y" => Ok(Self::FiveYears),
            "10y" => Ok(Self::TenYears),
            "ytd" => Ok(Self::YearToDate),
            "max" => Ok(Self::Max),
            _ => Err(AnalysisError::InvalidParameter {
                name: "period",
                reason: format!("unsupported lookback period '{s}'"),
            }),
        }
    }
}
