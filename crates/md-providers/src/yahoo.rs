use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use md_core::{build_error_from_http, ErrorMeta, Frame, MarketDataError, RawFrame};
use reqwest::Client;
use serde::Deserialize;

use crate::adapter::{finalize, Adapter};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const DOWNLOAD_URL: &str = "https://query1.finance.yahoo.com/v7/finance/download";

/// Adapter over Yahoo Finance's unofficial endpoints, grounded in
/// `data_extractor/adapters/yahoo_adapter.py::YahooAdapter`. The original
/// tries `yfinance` then falls back to `pandas_datareader`; this adapter
/// mirrors that two-path shape with its own primary (intraday-capable
/// chart JSON) and fallback (daily-only CSV download) HTTP paths.
pub struct YahooAdapter {
    client: Client,
}

impl YahooAdapter {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: &str,
    ) -> Result<RawFrame, MarketDataError> {
        let mut params = vec![("interval", interval.to_string())];
        if let Some(s) = start {
            params.push(("period1", s.timestamp().to_string()));
        }
        if let Some(e) = end {
            params.push(("period2", e.timestamp().to_string()));
        }

        let url = format!("{CHART_URL}/{symbol}");
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.network_error(symbol, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            return Err(build_error_from_http(
                format!("yahoo chart HTTP {status}"),
                self.name(),
                Some(symbol),
                Some(status.as_u16()),
                retry_after.as_deref(),
            ));
        }

        let body: YahooChartResponse = response.json().await.map_err(|e| {
            MarketDataError::extraction(
                format!("failed to parse Yahoo chart response: {e}"),
                ErrorMeta::new().source(self.name()).symbol(symbol),
            )
        })?;

        parse_chart_body(body, symbol, self.name())
    }

    /// Daily-only fallback path, the Rust analog of `pandas_datareader`'s
    /// `get_data_yahoo`. Rejects intraday intervals outright.
    async fn fetch_download(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: &str,
    ) -> Result<RawFrame, MarketDataError> {
        if interval != "1d" {
            return Err(MarketDataError::bad_request(
                format!("Yahoo fallback path only supports daily data, got '{interval}'"),
                ErrorMeta::new().source(self.name()).symbol(symbol),
            ));
        }

        let mut params = vec![("interval", "1d".to_string())];
        if let Some(s) = start {
            params.push(("period1", s.timestamp().to_string()));
        }
        if let Some(e) = end {
            params.push(("period2", e.timestamp().to_string()));
        }

        let url = format!("{DOWNLOAD_URL}/{symbol}");
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.network_error(symbol, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(build_error_from_http(
                format!("yahoo download HTTP {status}"),
                self.name(),
                Some(symbol),
                Some(status.as_u16()),
                None,
            ));
        }

        let body = response.text().await.map_err(|e| {
            MarketDataError::extraction(
                format!("failed to read Yahoo download body: {e}"),
                ErrorMeta::new().source(self.name()).symbol(symbol),
            )
        })?;

        parse_download_csv(&body, symbol, self.name())
    }

    fn network_error(&self, symbol: &str, e: &reqwest::Error) -> MarketDataError {
        let meta = ErrorMeta::new().source(self.name()).symbol(symbol);
        if e.is_timeout() {
            MarketDataError::TemporaryNetworkError {
                message: format!("timeout contacting Yahoo: {e}"),
                meta,
                cause: None,
            }
        } else {
            MarketDataError::ExtractionError {
                message: format!("network error contacting Yahoo: {e}"),
                meta,
                cause: None,
            }
        }
    }
}

#[async_trait::async_trait]
impl Adapter for YahooAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn supports_intraday(&self) -> bool {
        true
    }

    fn allowed_intervals(&self) -> &[&'static str] {
        &["1m", "5m", "15m", "30m", "1h", "1d", "1wk", "1mo"]
    }

    async fn download_symbol(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: &str,
    ) -> Result<Frame, MarketDataError> {
        let raw = match self.fetch_chart(symbol, start, end, interval).await {
            Ok(raw) => raw,
            Err(primary_err) => {
                tracing::warn!(
                    symbol,
                    error = %primary_err,
                    "Yahoo primary chart path failed, falling back to daily download path"
                );
                self.fetch_download(symbol, start, end, interval)
                    .await
                    .map_err(|fallback_err| {
                        tracing::error!(symbol, error = %fallback_err, "Yahoo fallback path also failed");
                        fallback_err
                    })?
            }
        };

        finalize(&raw, self.name(), symbol, start, end)
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooChartResult>>,
    error: Option<YahooChartError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartError {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
    adjclose: Option<Vec<YahooAdjClose>>,
}

#[derive(Debug, Deserialize, Default)]
struct YahooQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct YahooAdjClose {
    adjclose: Vec<Option<f64>>,
}

fn parse_chart_body(
    body: YahooChartResponse,
    symbol: &str,
    source: &str,
) -> Result<RawFrame, MarketDataError> {
    if let Some(err) = body.chart.error {
        return Err(MarketDataError::symbol_not_found(
            err.description
                .unwrap_or_else(|| format!("symbol not found: {symbol}")),
            ErrorMeta::new().source(source).symbol(symbol),
        ));
    }

    let result = body
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| {
            MarketDataError::symbol_not_found(
                format!("no chart data returned for '{symbol}'"),
                ErrorMeta::new().source(source).symbol(symbol),
            )
        })?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0).adjclose) });

    let index: Vec<DateTime<Utc>> = timestamps
        .iter()
        .map(|&secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now))
        .collect();

    let to_nan_vec = |v: Vec<Option<f64>>| -> Vec<f64> {
        v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect()
    };

    let mut raw = RawFrame::new(index)
        .with_column("Open", to_nan_vec(quote.open))
        .with_column("High", to_nan_vec(quote.high))
        .with_column("Low", to_nan_vec(quote.low))
        .with_column("Close", to_nan_vec(quote.close))
        .with_column("Volume", to_nan_vec(quote.volume));

    if let Some(adj) = adjclose {
        raw = raw.with_column("Adj Close", to_nan_vec(adj));
    }

    Ok(raw)
}

/// Parses the legacy Yahoo CSV download format:
/// `Date,Open,High,Low,Close,Adj Close,Volume`.
fn parse_download_csv(body: &str, symbol: &str, source: &str) -> Result<RawFrame, MarketDataError> {
    let mut lines = body.lines();
    let header = lines.next().ok_or_else(|| {
        MarketDataError::extraction(
            "empty Yahoo download response",
            ErrorMeta::new().source(source).symbol(symbol),
        )
    })?;
    let columns: Vec<&str> = header.split(',').collect();

    let mut index = Vec::new();
    let mut open = Vec::new();
    let mut high = Vec::new();
    let mut low = Vec::new();
    let mut close = Vec::new();
    let mut adj_close = Vec::new();
    let mut volume = Vec::new();

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != columns.len() {
            continue;
        }
        let date = cells[0];
        let Ok(naive) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            continue;
        };
        let ts = Utc.from_utc_datetime(&naive.and_hms_opt(0, 0, 0).unwrap());
        index.push(ts);

        let parse_cell = |v: &str| -> f64 { v.parse().unwrap_or(f64::NAN) };
        open.push(parse_cell(cells[1]));
        high.push(parse_cell(cells[2]));
        low.push(parse_cell(cells[3]));
        close.push(parse_cell(cells[4]));
        adj_close.push(parse_cell(cells[5]));
        volume.push(parse_cell(cells[6]));
    }

    Ok(RawFrame::new(index)
        .with_column("Open", open)
        .with_column("High", high)
        .with_column("Low", low)
        .with_column("Close", close)
        .with_column("Adj Close", adj_close)
        .with_column("Volume", volume))
}
