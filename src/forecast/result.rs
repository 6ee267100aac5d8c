use chrono::NaiveDate;
use serde::Serialize;

/// One forecast row, in the units of the analysed column.
///
/// `yearly` and `weekly` are fractions of `trend` under multiplicative
/// seasonality and absolute offsets under additive seasonality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
    pub yearly: f64,
    pub weekly: f64,
}

/// Fitted values over the history followed by the projected future rows.
#[derive(Debug, Clone)]
pub struct ForecastResult {
    rows: Vec<ForecastRow>,
    history_len: usize,
    /// Fitted noise level in original units.
    pub sigma: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl ForecastResult {
    pub(crate) fn new(
        rows: Vec<ForecastRow>,
        history_len: usize,
        sigma: f64,
        iterations: usize,
        converged: bool,
    ) -> Self {
        Self {
            rows,
            history_len,
            sigma,
            iterations,
            converged,
        }
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn history(&self) -> &[ForecastRow] {
        &self.rows[..self.history_len]
    }

    pub fn future(&self) -> &[ForecastRow] {
        &self.rows[self.history_len..]
    }

    pub fn last(&self) -> Option<&ForecastRow> {
        self.rows.last()
    }
}
