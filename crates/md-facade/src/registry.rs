use std::sync::Arc;

use md_core::{ErrorMeta, MarketDataError};
use md_providers::{Adapter, BinanceAdapter, TiingoAdapter, YahooAdapter};

use crate::config::{ExtractorConfig, Source};

/// Constructs the adapter named by `cfg.source`, forwarding `timeout` and
/// `api_key` (only when present), per §4.10's registry contract. Expressed
/// as a `match` over the closed `Source` enum rather than a runtime-mutable
/// map, since the provider set is fixed at compile time (§9's "global
/// mutable state" design note).
pub fn build_adapter(cfg: &ExtractorConfig) -> Result<Arc<dyn Adapter>, MarketDataError> {
    match cfg.source {
        Source::Yahoo => Ok(Arc::new(YahooAdapter::new(cfg.timeout_secs))),
        Source::Binance => Ok(Arc::new(BinanceAdapter::new(cfg.timeout_secs))),
        Source::Tiingo => {
            let adapter = TiingoAdapter::new(cfg.api_key.clone(), cfg.timeout_secs)?;
            Ok(Arc::new(adapter))
        }
    }
}

/// Looks up a source by its wire tag, the entry point used when the tag
/// arrives as a request string rather than an already-parsed [`Source`].
/// Unknown tag → `BadRequestError`, since the taxonomy has no generic
/// `ValueError` variant and this is a caller-input mistake.
pub fn build_adapter_by_name(name: &str, cfg: &ExtractorConfig) -> Result<Arc<dyn Adapter>, MarketDataError> {
    let source = Source::parse(name).ok_or_else(|| {
        MarketDataError::bad_request(
            format!("unknown market data source '{name}'"),
            ErrorMeta::new().source(name),
        )
    })?;
    build_adapter(&ExtractorConfig { source, ..cfg.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_source_name_is_a_bad_request() {
        let cfg = ExtractorConfig::default();
        let err = build_adapter_by_name("stooq", &cfg).unwrap_err();
        assert!(matches!(err, MarketDataError::BadRequestError { .. }));
    }

    #[test]
    fn tiingo_without_api_key_is_an_auth_error() {
        std::env::remove_var("TIINGO_API_KEY");
        let cfg = ExtractorConfig {
            source: Source::Tiingo,
            ..ExtractorConfig::default()
        };
        let err = build_adapter(&cfg).unwrap_err();
        assert!(matches!(err, MarketDataError::AuthError { .. }));
    }

    #[test]
    fn yahoo_and_binance_construct_without_credentials() {
        let cfg = ExtractorConfig::default();
        assert!(build_adapter(&cfg).is_ok());
        let cfg = ExtractorConfig {
            source: Source::Binance,
            ..ExtractorConfig::default()
        };
        assert!(build_adapter(&cfg).is_ok());
    }
}
