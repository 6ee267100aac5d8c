// =============================================================================
// Fourier seasonality features
// =============================================================================
//
// A seasonal component with period P and order N is a linear combination of
//
//   sin(2π·k·t / P), cos(2π·k·t / P)     for k = 1..=N
//
// where t is measured in days since 1970-01-01, so the same calendar date
// always lands on the same phase regardless of where the history starts.

use std::f64::consts::PI;
use std::ops::Range;

use chrono::NaiveDate;

pub const YEARLY_PERIOD_DAYS: f64 = 365.25;
pub const WEEKLY_PERIOD_DAYS: f64 = 7.0;

/// One named seasonal block and where its columns sit in the feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalBlock {
    pub name: &'static str,
    pub period: f64,
    pub order: usize,
    pub columns: Range<usize>,
}

/// Layout of the seasonal design matrix: yearly block then weekly block.
/// A block with order 0 is omitted.
#[derive(Debug, Clone)]
pub struct SeasonalLayout {
    blocks: Vec<SeasonalBlock>,
    width: usize,
}

impl SeasonalLayout {
    pub fn new(yearly_order: usize, weekly_order: usize) -> Self {
        let mut blocks = Vec::new();
        let mut width = 0;
        for (name, period, order) in [
            ("yearly", YEARLY_PERIOD_DAYS, yearly_order),
            ("weekly", WEEKLY_PERIOD_DAYS, weekly_order),
        ] {
            if order == 0 {
                continue;
            }
            let cols = 2 * order;
            blocks.push(SeasonalBlock {
                name,
                period,
                order,
                columns: width..width + cols,
            });
            width += cols;
        }
        Self { blocks, width }
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn block(&self, name: &str) -> Option<&SeasonalBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// Feature row for one calendar date.
    pub fn features(&self, date: NaiveDate) -> Vec<f64> {
        let t = epoch_days(date);
        let mut row = Vec::with_capacity(self.width);
        for block in &self.blocks {
            fourier_terms(t, block.period, block.order, &mut row);
        }
        row
    }

    /// Row-major feature matrix, one row per date.
    pub fn matrix(&self, dates: &[NaiveDate]) -> Vec<Vec<f64>> {
        dates.iter().map(|&d| self.features(d)).collect()
    }
}

/// Contribution of one block given a feature row and the fitted coefficients.
pub fn block_effect(block: &SeasonalBlock, row: &[f64], beta: &[f64]) -> f64 {
    block
        .columns
        .clone()
        .map(|c| row[c] * beta[c])
        .sum()
}

/// Days since the Unix epoch as a float.
pub fn epoch_days(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as f64
}

fn fourier_terms(t: f64, period: f64, order: usize, out: &mut Vec<f64>) {
    for k in 1..=order {
        let x = 2.0 * PI * k as f64 * t / period;
        out.push(x.sin());
        out.push(x.cos());
    }
}
