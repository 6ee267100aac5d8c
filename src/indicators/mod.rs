// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators published with
// every analysis. Each function returns a full series aligned with its input,
// with NaN marking the rows that lack enough preceding history. Values at
// position i never depend on positions after i.

pub mod bollinger;
pub mod ema;
pub mod frame;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use frame::{compute_indicators, IndicatorFrame, IndicatorRow};
