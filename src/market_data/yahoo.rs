// =============================================================================
// Yahoo Finance chart client - daily OHLCV history
// =============================================================================
//
// Talks to the public v8 chart endpoint. Timestamps come back as UTC epoch
// seconds at the exchange open; shifting them by the exchange `gmtoffset`
// before taking the calendar date yields the trading day as the exchange
// sees it, with the timezone stripped.
// =============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::AnalysisError;
use crate::market_data::{Bar, HistoryRange, MarketDataProvider, PriceSeries};
use crate::runtime_config::ProviderConfig;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Yahoo Finance REST client.
#[derive(Clone)]
pub struct YahooClient {
    base_url: reqwest::Url,
    client: reqwest::Client,
}

impl YahooClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = reqwest::Url::parse(config.base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid provider base_url {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("provider base_url {} cannot carry a path", config.base_url);
        }

        debug!(base_url = %base_url, "YahooClient initialised");

        Ok(Self { base_url, client })
    }

    /// Chart URL for one ticker. The ticker is pushed as a single path
    /// segment, so `/`, `?`, `#` and `%` are percent-encoded.
    fn chart_url(&self, ticker: &str) -> Result<reqwest::Url, AnalysisError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AnalysisError::Provider(format!("base url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);
        Ok(url)
    }

    fn query_params(range: HistoryRange) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];
        match range {
            HistoryRange::Since(start) => {
                let period1 = start
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp())
                    .unwrap_or_default();
                params.push(("period1", period1.to_string()));
                params.push(("period2", Utc::now().timestamp().to_string()));
            }
            HistoryRange::Lookback(period) => {
                params.push(("range", period.as_str().to_string()));
            }
        }
        params
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    #[instrument(skip(self), name = "yahoo::fetch_history")]
    async fn fetch_history(
        &self,
        ticker: &str,
        range: HistoryRange,
    ) -> Result<PriceSeries, AnalysisError> {
        let url = self.chart_url(ticker)?;

        let resp = self
            .client
            .get(url.clone())
            .query(&Self::query_params(range))
            .send()
            .await
            .map_err(|e| AnalysisError::Provider(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!(ticker, "Yahoo returned 404");
            return Err(AnalysisError::NoDataFound {
                ticker: ticker.to_string(),
            });
        }
        if !status.is_success() {
            return Err(AnalysisError::Provider(format!(
                "Yahoo chart for {ticker} returned {status}"
            )));
        }

        let body: ChartResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::Provider(format!("failed to decode chart for {ticker}: {e}")))?;

        let series = parse_chart(ticker, body)?;
        debug!(
            ticker,
            range = %range,
            bars = series.len(),
            first = ?series.first_date(),
            last = ?series.last_date(),
            "history retrieved"
        );
        Ok(series)
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}

fn trading_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// Turn a decoded chart payload into a validated series.
///
/// Bars with no price at all are dropped; when two timestamps fall on the
/// same trading date the later one wins.
fn parse_chart(ticker: &str, body: ChartResponse) -> Result<PriceSeries, AnalysisError> {
    if let Some(err) = body.chart.error {
        let code = err.code.unwrap_or_default();
        if code.eq_ignore_ascii_case("Not Found") {
            return Err(AnalysisError::NoDataFound {
                ticker: ticker.to_string(),
            });
        }
        return Err(AnalysisError::Provider(format!(
            "{code}: {}",
            err.description.unwrap_or_default()
        )));
    }

    let no_data = || AnalysisError::NoDataFound {
        ticker: ticker.to_string(),
    };

    let result = body
        .chart
        .result
        .and_then(|mut r| r.pop())
        .ok_or_else(no_data)?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adj = result
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(date) = trading_date(ts, result.meta.gmtoffset) else {
            continue;
        };
        let bar = Bar {
            date,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close: at(&quote.close, i),
            adj_close: at(&adj, i),
            volume: at(&quote.volume, i),
        };
        if bar.open.is_none() && bar.high.is_none() && bar.low.is_none() && bar.close.is_none() {
            continue;
        }
        by_date.insert(date, bar);
    }

    if by_date.is_empty() {
        return Err(no_data());
    }

    PriceSeries::new(ticker, by_date.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LookbackPeriod, PriceColumn};

    fn decode(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    // 2024-01-02 14:30 UTC and 2024-01-03 14:30 UTC, New York offset -5h.
    const TWO_DAYS: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "currency": "USD", "gmtoffset": -18000 },
                "timestamp": [1704205800, 1704292200],
                "indicators": {
                    "quote": [{
                        "open":   [187.15, 184.22],
                        "high":   [188.44, 185.88],
                        "low":    [183.89, 183.43],
                        "close":  [185.64, 184.25],
                        "volume": [82488700, 58414500]
                    }],
                    "adjclose": [{ "adjclose": [184.73, 183.35] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_bars_with_naive_dates() {
        let series = parse_chart("AAPL", decode(TWO_DAYS)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 1, 3));

        let bar = &series.bars()[0];
        assert_eq!(bar.close, Some(185.64));
        assert_eq!(bar.adj_close, Some(184.73));
        assert_eq!(bar.volume, Some(82_488_700.0));
        assert_eq!(series.column(PriceColumn::AdjClose), vec![184.73, 183.35]);
    }

    #[test]
    fn drops_empty_bars_and_collapses_duplicate_dates() {
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 0 },
                    "timestamp": [1704153600, 1704240000, 1704283200],
                    "indicators": {
                        "quote": [{
                            "open":   [null, 10.0, 10.5],
                            "high":   [null, 11.0, 11.5],
                            "low":    [null,  9.0,  9.5],
                            "close":  [null, 10.0, 11.0],
                            "volume": [null, 100, 150]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let series = parse_chart("X", decode(json)).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, Some(11.0));
        assert_eq!(series.bars()[0].adj_close, None);
    }

    #[test]
    fn not_found_error_maps_to_no_data() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        }"#;
        let err = parse_chart("ZZZZ", decode(json)).unwrap_err();
        assert_eq!(err.kind(), "no_data_found");
    }

    #[test]
    fn empty_result_maps_to_no_data() {
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 0 },
                    "indicators": { "quote": [{}] }
                }],
                "error": null
            }
        }"#;
        let err = parse_chart("EMPTY", decode(json)).unwrap_err();
        assert_eq!(err.kind(), "no_data_found");
    }

    #[test]
    fn other_chart_errors_are_provider_errors() {
        let json = r#"{
            "chart": { "result": null, "error": { "code": "Bad Request", "description": "Invalid input" } }
        }"#;
        let err = parse_chart("X", decode(json)).unwrap_err();
        assert_eq!(err.kind(), "provider_error");
    }

    #[test]
    fn query_params_for_lookback_and_since() {
        let params = YahooClient::query_params(HistoryRange::Lookback(LookbackPeriod::OneYear));
        assert!(params.contains(&("range", "1y".to_string())));

        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let params = YahooClient::query_params(HistoryRange::Since(start));
        assert!(params.contains(&("period1", "946684800".to_string())));
        assert!(params.iter().any(|(k, _)| *k == "period2"));
    }

    fn client(base_url: &str) -> YahooClient {
        YahooClient::new(&ProviderConfig {
            base_url: base_url.to_string(),
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn chart_url_appends_ticker_segment() {
        let url = client("https://query1.finance.yahoo.com/").chart_url("BRK-B").unwrap();
        assert_eq!(url.as_str(), "https://query1.finance.yahoo.com/v8/finance/chart/BRK-B");

        let url = client("http://localhost:9000/proxy").chart_url("^GSPC").unwrap();
        assert_eq!(url.path(), "/proxy/v8/finance/chart/^GSPC");
    }

    #[test]
    fn chart_url_escapes_path_and_query_characters() {
        let yahoo = client("https://query1.finance.yahoo.com");
        let url = yahoo.chart_url("A/../v7").unwrap();
        assert_eq!(url.path(), "/v8/finance/chart/A%2F..%2Fv7");

        let url = yahoo.chart_url("X?range=max#frag").unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn unparseable_base_url_is_rejected() {
        let config = ProviderConfig {
            base_url: "not a url".to_string(),
            ..ProviderConfig::default()
        };
        assert!(YahooClient::new(&config).is_err());
    }
}
