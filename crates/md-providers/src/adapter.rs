use chrono::{DateTime, Utc};
use md_core::{ErrorMeta, Frame, MarketDataError, RawFrame};

/// Per-source fetch of one symbol's raw frame, grounded in
/// `data_extractor/core/base/base_adapter.py::BaseAdapter` (the richer of
/// the two near-duplicate adapter bases in the source tree — see
/// DESIGN.md).
///
/// Implementors fetch and parse the wire payload into a [`RawFrame`]; the
/// shared contract in [`finalize`] takes care of canonicalization, window
/// clipping, and the empty-result-is-`SymbolNotFound` rule so every adapter
/// gets identical behavior at the seam described in the component design's
/// §4.3.4.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    /// Stable tag used in error metadata and the registry (C10).
    fn name(&self) -> &'static str;

    fn supports_intraday(&self) -> bool;

    fn allowed_intervals(&self) -> &[&'static str];

    async fn download_symbol(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        interval: &str,
    ) -> Result<Frame, MarketDataError>;
}

/// Shared tail of every adapter's `download_symbol`: canonicalize, clip to
/// the requested window, validate invariants, and turn an empty result into
/// `SymbolNotFound` rather than an empty-but-"successful" frame.
pub fn finalize(
    raw: &RawFrame,
    source: &str,
    symbol: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Frame, MarketDataError> {
    let canonical = Frame::canonicalize(raw, source)?;
    let clipped = canonical.clip_range(start, end);
    clipped.validate(source)?;
    if clipped.is_empty() {
        return Err(MarketDataError::symbol_not_found(
            format!("no data for '{symbol}' in requested range"),
            ErrorMeta::new().source(source).symbol(symbol),
        ));
    }
    Ok(clipped)
}
