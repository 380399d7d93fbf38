//! The single entry point tying adapters, alignment, and typology building
//! together, grounded in
//! `original_source/src/data_extractor/core/market_data.py::get_market_data`.
//!
//! Everything else in the workspace is a building block this module wires
//! up: [`md_providers`] for I/O, [`md_core`] for the synchronous
//! normalization core. `md-portfolio`'s `Portfolio`/Monte Carlo types are
//! built directly by callers from the series this module returns, rather
//! than through the facade itself — the original's portfolio simulation
//! entry points are separate from `get_market_data`.

pub mod config;
pub mod registry;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use md_core::{align, build_typology, AlignMode, ErrorMeta, Frame, MarketDataError, SeriesType, Typology};
use md_providers::fetcher::{fetch_many, DEFAULT_CONCURRENCY};

pub use config::{AlignPolicy, ExtractorConfig, Source};

/// Extra per-request options layered over the config's defaults, per §6's
/// `{align, ffill, bfill, window?, ann_factor?}` request shape.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub align: Option<AlignPolicy>,
    pub ffill: Option<bool>,
    pub bfill: Option<bool>,
    pub window: Option<usize>,
    pub ann_factor: Option<f64>,
}

/// Normalizes a caller-supplied ticker list: dedup preserving order, reject
/// empty, per §4.10's input-handling rules.
fn normalize_tickers(tickers: &[String]) -> Result<Vec<String>, MarketDataError> {
    if tickers.is_empty() {
        return Err(MarketDataError::bad_request(
            "at least one ticker is required",
            ErrorMeta::new(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(tickers.len());
    for t in tickers {
        if seen.insert(t.clone()) {
            out.push(t.clone());
        }
    }
    Ok(out)
}

fn resolve_align_mode(cfg: &ExtractorConfig, opts: &RequestOptions) -> Option<AlignMode> {
    opts.align.unwrap_or(cfg.align).as_align_mode()
}

/// Fetches, aligns, and projects market data for one or more symbols, the
/// Rust counterpart of `get_market_data(tickers, start?, end?, interval?,
/// kind='ohlcv', **opts)`.
///
/// - `start > end` is rejected before any network call is made.
/// - Symbols that fail individually are simply absent from the result map
///   (and logged); if every symbol fails, the aggregated error from
///   [`fetch_many`] propagates unchanged.
/// - Alignment defaults (`align`/`ffill`/`bfill`) come from `cfg` unless
///   overridden in `opts`; `align = none` skips alignment and each symbol's
///   own (canonical, unaligned) index is used for the typology build.
pub async fn get_market_data(
    cfg: &ExtractorConfig,
    tickers: &[String],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    interval: Option<&str>,
    kind: &str,
    opts: RequestOptions,
) -> Result<BTreeMap<String, SeriesType>, MarketDataError> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(MarketDataError::bad_request(
                format!("start ({s}) must not be after end ({e})"),
                ErrorMeta::new(),
            ));
        }
    }

    let symbols = normalize_tickers(tickers)?;
    let interval = interval.unwrap_or(&cfg.interval).to_string();
    let adapter = registry::build_adapter(cfg)?;

    tracing::info!(symbols = symbols.len(), source = cfg.source.as_str(), "fetching market data");
    let outcome = fetch_many(adapter, &symbols, start, end, &interval, DEFAULT_CONCURRENCY).await?;
    tracing::info!(fetched = outcome.frames.len(), failed = outcome.errors.len(), "fetch complete");

    let ffill = opts.ffill.unwrap_or(cfg.ffill);
    let bfill = opts.bfill.unwrap_or(cfg.bfill);
    let aligned: BTreeMap<String, Frame> = match resolve_align_mode(cfg, &opts) {
        Some(mode) => align(&outcome.frames, mode, ffill, bfill),
        None => outcome.frames,
    };

    let typology = Typology::parse(kind, opts.window, opts.ann_factor)?;

    let mut result = BTreeMap::new();
    for (symbol, frame) in &aligned {
        let series = build_typology(typology, symbol, cfg.source.as_str(), frame)?;
        result.insert(symbol.clone(), series);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_ticker_list() {
        let err = normalize_tickers(&[]).unwrap_err();
        assert!(matches!(err, MarketDataError::BadRequestError { .. }));
    }

    #[test]
    fn dedups_tickers_preserving_order() {
        let out = normalize_tickers(&["AAPL".to_string(), "MSFT".to_string(), "AAPL".to_string()])
            .unwrap();
        assert_eq!(out, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn align_none_resolves_to_no_mode() {
        let cfg = ExtractorConfig::default();
        let opts = RequestOptions {
            align: Some(AlignPolicy::None),
            ..Default::default()
        };
        assert!(resolve_align_mode(&cfg, &opts).is_none());
    }

    #[test]
    fn align_defaults_to_config_when_not_overridden() {
        let cfg = ExtractorConfig::default();
        let opts = RequestOptions::default();
        assert_eq!(resolve_align_mode(&cfg, &opts), Some(AlignMode::Intersect));
    }

    #[tokio::test]
    async fn rejects_start_after_end() {
        let cfg = ExtractorConfig::default();
        let start = Utc::now();
        let end = start - chrono::Duration::days(1);
        let err = get_market_data(
            &cfg,
            &["AAPL".to_string()],
            Some(start),
            Some(end),
            None,
            "ohlcv",
            RequestOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketDataError::BadRequestError { .. }));
    }
}
