use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use md_core::{ErrorMeta, Frame, MarketDataError, RawFrame};
use reqwest::Client;
use serde::Deserialize;

use crate::adapter::{finalize, Adapter};

const BASE_URL: &str = "https://api.tiingo.com/tiingo/daily";

/// Adapter over Tiingo's daily EOD API, grounded in
/// `data_extractor/adapters/tiingo_adapter.py::TiingoAdapter`. Daily-only;
/// requires an API key passed explicitly or read from `TIINGO_API_KEY`.
pub struct TiingoAdapter {
    client: Client,
    api_key: String,
}

impl TiingoAdapter {
    /// Mirrors `TiingoAdapter.__init__`'s fallback to the environment when
    /// no key is supplied directly.
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> Result<Self, MarketDataError> {
        let api_key = api_key
            .or_else(|| std::env::var("TIINGO_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                MarketDataError::AuthError {
                    message: "Tiingo API key required (set it explicitly or via TIINGO_API_KEY)"
                        .to_string(),
                    meta: ErrorMeta::new().source("tiingo"),
                    cause: None,
                }
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self { client, api_key })
    }

    async fn fetch_prices(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<TiingoBar>, MarketDataError> {
        let mut params = vec![
            ("token", self.api_key.clone()),
            ("format", "json".to_string()),
        ];
        if let Some(s) = start {
            params.push(("startDate", s.format("%Y-%m-%d").to_string()));
        }
        if let Some(e) = end {
            params.push(("endDate", e.format("%Y-%m-%d").to_string()));
        }

        let url = format!("{BASE_URL}/{symbol}/prices");
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                let meta = ErrorMeta::new().source(self.name()).symbol(symbol);
                if e.is_timeout() {
                    MarketDataError::TemporaryNetworkError {
                        message: format!("timeout querying Tiingo for '{symbol}': {e}"),
                        meta,
                        cause: None,
                    }
                } else {
                    MarketDataError::ExtractionError {
                        message: format!("network error querying Tiingo: {e}"),
                        meta,
                        cause: None,
                    }
                }
            })?;

        let status = response.status();
        let meta = || ErrorMeta::new().source(self.name()).symbol(symbol).status(status.as_u16());
        match status.as_u16() {
            200 => {}
            401 => {
                return Err(MarketDataError::AuthError {
                    message: "invalid or expired Tiingo API key".to_string(),
                    meta: meta(),
                    cause: None,
                })
            }
            404 => {
                return Err(MarketDataError::symbol_not_found(
                    format!("symbol '{symbol}' not found on Tiingo"),
                    meta(),
                ))
            }
            429 => {
                return Err(MarketDataError::RateLimitError {
                    message: "Tiingo rate limit exceeded (500 req/hour)".to_string(),
                    meta: meta(),
                    cause: None,
                })
            }
            _ if status.is_client_error() || status.is_server_error() => {
                return Err(MarketDataError::ExtractionError {
                    message: format!("HTTP {status} querying Tiingo"),
                    meta: meta(),
                    cause: None,
                })
            }
            _ => {}
        }

        let bars: Vec<TiingoBar> = response.json().await.map_err(|e| {
            MarketDataError::extraction(
                format!("failed to parse Tiingo response: {e}"),
                ErrorMeta::new().source(self.name()).symbol(symbol),
            )
        })?;

        if bars.is_empty() {
            return Err(MarketDataError::symbol_not_found(
                format!("no data returned for '{symbol}' on Tiingo"),
                ErrorMeta::new().source(self.name()).symbol(symbol),
            ));
        }

        Ok(bars)
    }
}

#[async_trait::async_trait]
impl Adapter for TiingoAdapter {
    fn name(&self) -> &'static str {
        "tiingo"
    }

    fn supports_intraday(&self) -> bool {
        false
    }

    fn allowed_intervals(&self) -> &[&'static str] {
        &["1d"]
    }

    async fn download_symbol(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: &str,
    ) -> Result<Frame, MarketDataError> {
        if interval != "1d" {
            return Err(MarketDataError::bad_request(
                format!("Tiingo free tier only supports daily data, got '{interval}'"),
                ErrorMeta::new().source(self.name()).symbol(symbol),
            ));
        }

        let bars = self.fetch_prices(symbol, start, end).await?;
        let raw = build_raw_frame(&bars);
        finalize(&raw, self.name(), symbol, start, end)
    }
}

/// One bar of Tiingo's daily-prices response. Adjusted fields are
/// preferred over the unadjusted ones when present, matching
/// `_parse_to_dataframe`'s `column_mapping` fallback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TiingoBar {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    adj_open: Option<f64>,
    #[serde(default)]
    adj_high: Option<f64>,
    #[serde(default)]
    adj_low: Option<f64>,
    #[serde(default)]
    adj_close: Option<f64>,
    #[serde(default)]
    adj_volume: Option<f64>,
}

fn build_raw_frame(bars: &[TiingoBar]) -> RawFrame {
    let index = bars
        .iter()
        .map(|b| {
            DateTime::parse_from_rfc3339(&b.date)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| {
                    Utc.from_utc_datetime(
                        &chrono::NaiveDate::parse_from_str(&b.date[..10], "%Y-%m-%d")
                            .unwrap_or_else(|_| chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
                            .and_hms_opt(0, 0, 0)
                            .unwrap(),
                    )
                })
        })
        .collect();

    let open = bars.iter().map(|b| b.adj_open.unwrap_or(b.open)).collect();
    let high = bars.iter().map(|b| b.adj_high.unwrap_or(b.high)).collect();
    let low = bars.iter().map(|b| b.adj_low.unwrap_or(b.low)).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.adj_close.unwrap_or(b.close)).collect();
    let volume = bars.iter().map(|b| b.adj_volume.unwrap_or(b.volume)).collect();

    RawFrame::new(index)
        .with_column("Open", open)
        .with_column("High", high)
        .with_column("Low", low)
        .with_column("Close", close.clone())
        .with_column("Adj Close", close)
        .with_column("Volume", volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_adjusted_fields_when_present() {
        let bars = vec![TiingoBar {
            date: "2024-01-02T00:00:00.000Z".to_string(),
            open: 100.0,
            high: 105.0,
            low: 99.0,
            close: 101.0,
            volume: 1_000.0,
            adj_open: Some(99.0),
            adj_high: Some(104.0),
            adj_low: Some(98.0),
            adj_close: Some(100.5),
            adj_volume: Some(990.0),
        }];
        let raw = build_raw_frame(&bars);
        assert_eq!(raw.columns["Open"], vec![99.0]);
        assert_eq!(raw.columns["Close"], vec![100.5]);
        assert_eq!(raw.columns["Adj Close"], vec![100.5]);
    }

    #[test]
    fn falls_back_to_unadjusted_fields_when_absent() {
        let bars = vec![TiingoBar {
            date: "2024-01-02T00:00:00.000Z".to_string(),
            open: 100.0,
            high: 105.0,
            low: 99.0,
            close: 101.0,
            volume: 1_000.0,
            adj_open: None,
            adj_high: None,
            adj_low: None,
            adj_close: None,
            adj_volume: None,
        }];
        let raw = build_raw_frame(&bars);
        assert_eq!(raw.columns["Close"], vec![101.0]);
    }

    #[test]
    fn missing_api_key_is_an_auth_error() {
        std::env::remove_var("TIINGO_API_KEY");
        let err = TiingoAdapter::new(None, 30).unwrap_err();
        assert!(matches!(err, MarketDataError::AuthError { .. }));
    }
}
