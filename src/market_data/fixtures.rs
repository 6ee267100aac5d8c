//! Synthetic series and an in-memory provider for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::AnalysisError;
use crate::market_data::{Bar, HistoryRange, MarketDataProvider, PriceSeries};

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

/// Consecutive calendar days starting at [`start_date`], one bar per value.
pub fn daily_series(ticker: &str, closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let date = start_date().checked_add_days(Days::new(i as u64)).unwrap();
            Bar::flat(date, c, 1_000.0 + i as f64)
        })
        .collect();
    PriceSeries::new(ticker, bars).unwrap()
}

/// Weekdays only, starting at [`start_date`]: the shape a real exchange
/// history has, with a two-day gap every weekend.
pub fn trading_day_series(ticker: &str, closes: &[f64]) -> PriceSeries {
    let dates = start_date()
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun));
    let bars = dates
        .zip(closes)
        .enumerate()
        .map(|(i, (date, &c))| Bar::flat(date, c, 1_000.0 + i as f64))
        .collect();
    PriceSeries::new(ticker, bars).unwrap()
}

pub fn constant_series(n: usize, price: f64) -> PriceSeries {
    daily_series("FLAT", &vec![price; n])
}

pub fn linear_series(n: usize, start: f64, step: f64) -> PriceSeries {
    let closes: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    daily_series("LINE", &closes)
}

/// Upward drift with a weekly wave and a small deterministic wobble.
pub fn seasonal_series(n: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            let weekly = 1.0 + 0.02 * (2.0 * std::f64::consts::PI * t / 7.0).sin();
            let wobble = 0.3 * (t * 1.7).sin();
            (50.0 + 0.1 * t) * weekly + wobble
        })
        .collect();
    daily_series("WAVE", &closes)
}

/// Provider backed by a fixed map of series; lookbacks are applied relative to
/// each series' last date.
#[derive(Default)]
pub struct InMemoryProvider {
    series: HashMap<String, PriceSeries>,
}

impl InMemoryProvider {
    pub fn with(mut self, ticker: &str, series: PriceSeries) -> Self {
        let rebuilt = PriceSeries::new(ticker, series.bars().to_vec()).unwrap();
        self.series.insert(ticker.to_string(), rebuilt);
        self
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<PriceSeries, AnalysisError> {
        let no_data = || AnalysisError::NoDataFound {
            ticker: ticker.to_string(),
        };
        let series = self.series.get(ticker).ok_or_else(no_data)?;
        let last = series.last_date().ok_or_else(no_data)?;

        let sliced = match range {
            HistoryRange::Since(start) => series.since(start),
            HistoryRange::Lookback(period) => match period.start_from(last) {
                Some(start) => series.since(start),
                None => series.clone(),
            },
        };
        if sliced.is_empty() {
            return Err(no_data());
        }
        Ok(sliced)
    }
}
