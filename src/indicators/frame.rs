// =============================================================================
// IndicatorFrame - a PriceSeries annotated with every derived column
// =============================================================================

use tracing::debug;

use crate::error::AnalysisError;
use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::macd::calculate_macd;
use crate::indicators::rsi::calculate_rsi;
use crate::indicators::sma::rolling_mean;
use crate::market_data::{Bar, PriceSeries};
use crate::runtime_config::IndicatorConfig;
use crate::types::PriceColumn;

/// Moving-average windows published with every frame.
pub const MA_WINDOWS: [usize; 3] = [20, 50, 200];

/// The input series plus derived columns, each aligned with the bars.
/// Undefined entries are NaN, never zero.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    series: PriceSeries,
    price_column: PriceColumn,
    values: Vec<f64>,
    pub ma_20: Vec<f64>,
    pub ma_50: Vec<f64>,
    pub ma_200: Vec<f64>,
    pub bb_middle: Vec<f64>,
    pub bb_upper: Vec<f64>,
    pub bb_lower: Vec<f64>,
    pub rsi: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub macd_hist: Vec<f64>,
}

/// One row of the frame, borrowed from the underlying bar.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorRow<'a> {
    pub bar: &'a Bar,
    pub ma_20: f64,
    pub ma_50: f64,
    pub ma_200: f64,
    pub bb_middle: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
}

/// Annotate `series` with moving averages, Bollinger Bands, RSI and MACD over
/// `column`.
///
/// A series with fewer than two points is a degenerate but valid input: the
/// frame comes back with every derived column undefined.
pub fn compute_indicators(
    series: &PriceSeries,
    column: PriceColumn,
    config: &IndicatorConfig,
) -> Result<IndicatorFrame, AnalysisError> {
    config.validate()?;

    let values = series.column(column);
    let n = values.len();

    if n < 2 {
        debug!(ticker = series.ticker(), rows = n, "too few rows, indicators undefined");
        let undefined = || vec![f64::NAN; n];
        return Ok(IndicatorFrame {
            series: series.clone(),
            price_column: column,
            values,
            ma_20: undefined(),
            ma_50: undefined(),
            ma_200: undefined(),
            bb_middle: undefined(),
            bb_upper: undefined(),
            bb_lower: undefined(),
            rsi: undefined(),
            macd: undefined(),
            macd_signal: undefined(),
            macd_hist: undefined(),
        });
    }

    let [w20, w50, w200] = MA_WINDOWS;
    let bands = calculate_bollinger(&values, config.bollinger_period, config.bollinger_num_std)?;
    let macd = calculate_macd(&values, config.macd_fast, config.macd_slow, config.macd_signal)?;

    let frame = IndicatorFrame {
        series: series.clone(),
        price_column: column,
        ma_20: rolling_mean(&values, w20)?,
        ma_50: rolling_mean(&values, w50)?,
        ma_200: rolling_mean(&values, w200)?,
        bb_middle: bands.middle,
        bb_upper: bands.upper,
        bb_lower: bands.lower,
        rsi: calculate_rsi(&values, config.rsi_period)?,
        macd: macd.macd,
        macd_signal: macd.signal,
        macd_hist: macd.histogram,
        values,
    };

    debug!(ticker = series.ticker(), rows = n, column = %column, "indicators computed");
    Ok(frame)
}

impl IndicatorFrame {
    pub fn series(&self) -> &PriceSeries {
        &self.series
    }

    pub fn price_column(&self) -> PriceColumn {
        self.price_column
    }

    /// The analysed column, NaN where the bar had no value.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn row(&self, i: usize) -> Option<IndicatorRow<'_>> {
        let bar = self.series.bars().get(i)?;
        Some(IndicatorRow {
            bar,
            ma_20: self.ma_20[i],
            ma_50: self.ma_50[i],
            ma_200: self.ma_200[i],
            bb_middle: self.bb_middle[i],
            bb_upper: self.bb_upper[i],
            bb_lower: self.bb_lower[i],
            rsi: self.rsi[i],
            macd: self.macd[i],
            macd_signal: self.macd_signal[i],
            macd_hist: self.macd_hist[i],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = IndicatorRow<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }
}
