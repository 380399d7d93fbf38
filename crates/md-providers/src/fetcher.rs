use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use md_core::{ErrorMeta, Frame, MarketDataError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::adapter::Adapter;

/// Default bound on concurrent in-flight `download_symbol` calls, per the
/// component design's §4.4.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome of a parallel multi-symbol fetch: the per-symbol canonical
/// frames that succeeded, and the per-symbol errors for the ones that
/// didn't. Mirrors the original extractor's `(results, errors)` pair
/// returned by `YahooAdapter.get_symbols`, generalized across adapters.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub frames: BTreeMap<String, Frame>,
    pub errors: BTreeMap<String, MarketDataError>,
}

/// Deduplicates `symbols` preserving first-seen order, the Rust analog of
/// the facade's ticker-normalization step in §4.10.
fn dedup_preserve_order(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(symbols.len());
    for s in symbols {
        if seen.insert(s.clone()) {
            out.push(s.clone());
        }
    }
    out
}

/// Fans out `adapter.download_symbol` across `symbols` with a bounded
/// worker pool, matching §4.4/§5's `Semaphore`-gated `tokio::spawn` +
/// `JoinSet` pattern (grounded in `data-loader::main`'s semaphore-gated
/// spawn loop and `analysis-orchestrator::screener`'s `JoinSet` drain).
///
/// Returns the partial-success [`FetchOutcome`] whenever at least one
/// symbol succeeds. If every symbol fails, returns a single aggregated
/// `ExtractionError` referencing the first failure, carrying the full
/// per-symbol error map in its cause chain is not attempted (the map
/// itself is logged; the error message summarizes it).
pub async fn fetch_many<A: Adapter + ?Sized + 'static>(
    adapter: Arc<A>,
    symbols: &[String],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    interval: &str,
    concurrency: usize,
) -> Result<FetchOutcome, MarketDataError> {
    let symbols = dedup_preserve_order(symbols);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for symbol in symbols {
        let adapter = Arc::clone(&adapter);
        let semaphore = Arc::clone(&semaphore);
        let interval = interval.to_string();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            let result = adapter.download_symbol(&symbol, start, end, &interval).await;
            (symbol, result)
        });
    }

    let mut outcome = FetchOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((symbol, Ok(frame))) => {
                tracing::info!(symbol = %symbol, rows = frame.len(), "fetched symbol");
                outcome.frames.insert(symbol, frame);
            }
            Ok((symbol, Err(e))) => {
                tracing::warn!(symbol = %symbol, error = %e, "symbol fetch failed");
                outcome.errors.insert(symbol, e);
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "fetch task panicked or was cancelled");
            }
        }
    }

    if outcome.frames.is_empty() && !outcome.errors.is_empty() {
        let (first_symbol, first_err) = outcome.errors.iter().next().unwrap();
        return Err(MarketDataError::extraction(
            format!(
                "all {} symbol(s) failed; first failure for '{first_symbol}': {first_err}",
                outcome.errors.len()
            ),
            ErrorMeta::new().source(first_err.meta().source.clone().unwrap_or_default()),
        ));
    }

    Ok(outcome)
}
