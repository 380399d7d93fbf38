//! Per-source adapters (Yahoo, Binance, Tiingo) and the parallel
//! multi-symbol fetcher that drives them.
//!
//! Every adapter funnels through the shared [`adapter::finalize`] contract:
//! canonicalize via `md-core`, clip to the requested window, and turn an
//! empty result into `SymbolNotFound`.

pub mod adapter;
pub mod binance;
pub mod fetcher;
pub mod tiingo;
pub mod yahoo;

pub use adapter::Adapter;
pub use binance::BinanceAdapter;
pub use fetcher::{fetch_many, FetchOutcome, DEFAULT_CONCURRENCY};
pub use tiingo::TiingoAdapter;
pub use yahoo::YahooAdapter;
