use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use md_core::{build_error_from_http, ErrorMeta, Frame, MarketDataError, RawFrame};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::adapter::{finalize, Adapter};

const BASE_URL: &str = "https://api.binance.com";
const REQUEST_LIMIT: u32 = 1000;

/// Fallback interval used when the caller asks for a tag Binance doesn't
/// recognize, per the component design's §4.3.2.
const FALLBACK_INTERVAL: &str = "1h";

const KNOWN_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Adapter over Binance's public spot `klines` REST endpoint, grounded in
/// `data_extractor/adapters/binance_adapter.py::BinanceAdapter`. No
/// credentials required; no pagination beyond the provider's own
/// per-request cap of ~1000 bars.
pub struct BinanceAdapter {
    client: Client,
}

impl BinanceAdapter {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    async fn request_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Vec<Value>>, MarketDataError> {
        let mut params: Vec<(&str, String)> = vec![
            ("symbol", symbol.to_uppercase()),
            ("interval", interval.to_string()),
            ("limit", REQUEST_LIMIT.to_string()),
        ];
        if let Some(s) = start {
            params.push(("startTime", s.timestamp_millis().to_string()));
        }
        if let Some(e) = end {
            params.push(("endTime", e.timestamp_millis().to_string()));
        }

        let response = self
            .client
            .get(format!("{BASE_URL}/api/v3/klines"))
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                let meta = ErrorMeta::new().source(self.name()).symbol(symbol);
                if e.is_timeout() {
                    MarketDataError::TemporaryNetworkError {
                        message: format!("timeout in Binance request: {e}"),
                        meta,
                        cause: None,
                    }
                } else {
                    MarketDataError::ExtractionError {
                        message: format!("network error in Binance request: {e}"),
                        meta,
                        cause: None,
                    }
                }
            })?;

        let status = response.status();
        if status.as_u16() == 400 {
            let text = response.text().await.unwrap_or_default();
            return Err(MarketDataError::bad_request(
                format!("bad request to Binance: {text}"),
                ErrorMeta::new().source(self.name()).symbol(symbol).status(400),
            ));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(build_error_from_http(
                format!("HTTP {status} from Binance: {text}"),
                self.name(),
                Some(symbol),
                Some(status.as_u16()),
                None,
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            MarketDataError::extraction(
                format!("failed to parse Binance response: {e}"),
                ErrorMeta::new().source(self.name()).symbol(symbol),
            )
        })?;

        match body {
            Value::Array(rows) => Ok(rows
                .into_iter()
                .filter_map(|r| r.as_array().cloned())
                .collect()),
            Value::Object(_) => {
                let msg = body.get("msg").and_then(Value::as_str).unwrap_or_default();
                if msg.contains("Invalid symbol") {
                    Err(MarketDataError::symbol_not_found(
                        format!("invalid symbol on Binance: {symbol}"),
                        ErrorMeta::new().source(self.name()).symbol(symbol),
                    ))
                } else {
                    Err(MarketDataError::extraction(
                        format!("unexpected Binance response: {body}"),
                        ErrorMeta::new().source(self.name()).symbol(symbol),
                    ))
                }
            }
            _ => Err(MarketDataError::extraction(
                "unexpected Binance response shape",
                ErrorMeta::new().source(self.name()).symbol(symbol),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Adapter for BinanceAdapter {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn supports_intraday(&self) -> bool {
        true
    }

    fn allowed_intervals(&self) -> &[&'static str] {
        KNOWN_INTERVALS
    }

    async fn download_symbol(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: &str,
    ) -> Result<Frame, MarketDataError> {
        let resolved_interval = if KNOWN_INTERVALS.contains(&interval) {
            interval
        } else {
            tracing::warn!(
                requested = interval,
                fallback = FALLBACK_INTERVAL,
                "unsupported Binance interval, forcing fallback"
            );
            FALLBACK_INTERVAL
        };

        let klines = self
            .request_klines(symbol, resolved_interval, start, end)
            .await?;

        let raw = build_raw_frame(&klines, symbol, self.name())?;
        finalize(&raw, self.name(), symbol, start, end)
    }
}

fn build_raw_frame(
    klines: &[Vec<Value>],
    symbol: &str,
    source: &str,
) -> Result<RawFrame, MarketDataError> {
    if klines.is_empty() {
        return Err(MarketDataError::symbol_not_found(
            format!("empty klines series for '{symbol}'"),
            ErrorMeta::new().source(source).symbol(symbol),
        ));
    }

    let mut index = Vec::with_capacity(klines.len());
    let mut open = Vec::with_capacity(klines.len());
    let mut high = Vec::with_capacity(klines.len());
    let mut low = Vec::with_capacity(klines.len());
    let mut close = Vec::with_capacity(klines.len());
    let mut volume = Vec::with_capacity(klines.len());

    for row in klines {
        let open_time_ms = row.first().and_then(Value::as_i64).unwrap_or(0);
        index.push(Utc.timestamp_millis_opt(open_time_ms).single().unwrap_or_else(Utc::now));
        open.push(parse_numeric(row.get(1)));
        high.push(parse_numeric(row.get(2)));
        low.push(parse_numeric(row.get(3)));
        close.push(parse_numeric(row.get(4)));
        volume.push(parse_numeric(row.get(5)));
    }

    Ok(RawFrame::new(index)
        .with_column("Open", open)
        .with_column("High", high)
        .with_column("Low", low)
        .with_column("Close", close.clone())
        .with_column("Adj Close", close)
        .with_column("Volume", volume))
}

fn parse_numeric(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or(f64::NAN),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct BinanceErrorBody {
        #[allow(dead_code)]
        code: i64,
        msg: String,
    }

    fn kline_row(open_ms: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Vec<Value> {
        vec![
            Value::from(open_ms),
            Value::from(o.to_string()),
            Value::from(h.to_string()),
            Value::from(l.to_string()),
            Value::from(c.to_string()),
            Value::from(v.to_string()),
        ]
    }

    #[test]
    fn builds_raw_frame_with_adj_close_equal_to_close() {
        let klines = vec![kline_row(0, 1.0, 2.0, 0.5, 1.5, 100.0)];
        let raw = build_raw_frame(&klines, "BTCUSDT", "binance").unwrap();
        assert_eq!(raw.columns["Close"], raw.columns["Adj Close"]);
    }

    #[test]
    fn rejects_empty_klines() {
        let err = build_raw_frame(&[], "BTCUSDT", "binance").unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound { .. }));
    }

    #[test]
    fn invalid_symbol_body_parses_as_error() {
        let body: BinanceErrorBody =
            serde_json::from_str(r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap();
        assert!(body.msg.contains("Invalid symbol"));
    }
}
