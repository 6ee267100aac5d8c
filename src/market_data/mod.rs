pub mod provider;
pub mod series;
pub mod yahoo;

#[cfg(test)]
pub mod fixtures;

pub use provider::{HistoryRange, MarketDataProvider};
pub use series::{Bar, PriceSeries};
pub use yahoo::YahooClient;
