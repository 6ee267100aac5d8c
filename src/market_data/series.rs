use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::PriceColumn;

// ---------------------------------------------------------------------------
// Bar
// ---------------------------------------------------------------------------

/// One daily OHLCV bar. Any field may be absent when the provider has a gap;
/// present fields are always finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
}

impl Bar {
    /// Bar whose every price field equals `close`, with the given volume.
    #[cfg(test)]
    pub fn flat(date: NaiveDate, close: f64, volume: f64) -> Self {
        Self {
            date,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
            adj_close: Some(close),
            volume: Some(volume),
        }
    }

    /// Value of `column`, falling back to `close` when the adjusted close is
    /// not reported.
    pub fn value(&self, column: PriceColumn) -> Option<f64> {
        match column {
            PriceColumn::Open => self.open,
            PriceColumn::High => self.high,
            PriceColumn::Low => self.low,
            PriceColumn::Close => self.close,
            PriceColumn::AdjClose => self.adj_close.or(self.close),
            PriceColumn::Volume => self.volume,
        }
    }

    fn fields(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("adj_close", self.adj_close),
            ("volume", self.volume),
        ]
    }
}

// ---------------------------------------------------------------------------
// PriceSeries
// ---------------------------------------------------------------------------

/// Ordered daily bars for one ticker.
///
/// Invariants (checked by [`PriceSeries::new`]):
/// * dates strictly ascending, so no duplicates;
/// * every present numeric field is finite.
///
/// The series is immutable once built; analyses borrow it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Result<Self, AnalysisError> {
        let ticker = ticker.into();

        for (i, bar) in bars.iter().enumerate() {
            for (name, value) in bar.fields() {
                if let Some(v) = value {
                    if !v.is_finite() {
                        return Err(AnalysisError::invalid(
                            "series",
                            format!("{ticker}: non-finite {name} on {}", bar.date),
                        ));
                    }
                }
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(AnalysisError::invalid(
                    "series",
                    format!(
                        "{ticker}: dates not strictly ascending at {} (after {})",
                        bar.date,
                        bars[i - 1].date
                    ),
                ));
            }
        }

        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Values of `column` aligned with the bars; absent entries become NaN.
    pub fn column(&self, column: PriceColumn) -> Vec<f64> {
        self.bars
            .iter()
            .map(|b| b.value(column).unwrap_or(f64::NAN))
            .collect()
    }

    /// `(date, value)` pairs of `column` with absent values dropped.
    pub fn observations(&self, column: PriceColumn) -> Vec<(NaiveDate, f64)> {
        self.bars
            .iter()
            .filter_map(|b| b.value(column).map(|v| (b.date, v)))
            .collect()
    }

    /// Sub-series of bars dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> Self {
        Self {
            ticker: self.ticker.clone(),
            bars: self.bars.iter().filter(|b| b.date >= start).cloned().collect(),
        }
    }
}
