use md_core::AlignMode;

/// Which adapter to instantiate, grounded in
/// `original_source/src/data_extractor/config.py::SourceName` (minus the
/// deprecated Stooq entry — see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Yahoo,
    Binance,
    Tiingo,
}

impl Default for Source {
    fn default() -> Self {
        Source::Yahoo
    }
}

impl Source {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "yahoo" => Some(Source::Yahoo),
            "binance" => Some(Source::Binance),
            "tiingo" => Some(Source::Tiingo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Yahoo => "yahoo",
            Source::Binance => "binance",
            Source::Tiingo => "tiingo",
        }
    }
}

/// The facade's alignment policy, a superset of `md_core::AlignMode` that
/// also allows skipping alignment entirely (`none`), per §6's config table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignPolicy {
    Intersect,
    Union,
    None,
}

impl Default for AlignPolicy {
    fn default() -> Self {
        AlignPolicy::Intersect
    }
}

impl AlignPolicy {
    pub fn as_align_mode(&self) -> Option<AlignMode> {
        match self {
            AlignPolicy::Intersect => Some(AlignMode::Intersect),
            AlignPolicy::Union => Some(AlignMode::Union),
            AlignPolicy::None => None,
        }
    }
}

/// Immutable configuration record driving adapter construction and default
/// request options, grounded in §6's configuration table.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub source: Source,
    pub timeout_secs: u64,
    pub interval: String,
    pub ffill: bool,
    pub bfill: bool,
    pub align: AlignPolicy,
    pub api_key: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            source: Source::default(),
            timeout_secs: 30,
            interval: "1d".to_string(),
            ffill: true,
            bfill: false,
            align: AlignPolicy::default(),
            api_key: None,
        }
    }
}

impl ExtractorConfig {
    /// Loads `.env` (if present) via `dotenvy::dotenv().ok()`, then fills
    /// `api_key` from `TIINGO_API_KEY` only when not already set on the
    /// record being built, matching `TiingoAdapter.__init__`'s fallback.
    /// This is the only environment access point in the facade.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        if cfg.api_key.is_none() {
            cfg.api_key = std::env::var("TIINGO_API_KEY").ok().filter(|k| !k.is_empty());
        }
        cfg
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let cfg = ExtractorConfig::default();
        assert_eq!(cfg.source, Source::Yahoo);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.interval, "1d");
        assert!(cfg.ffill);
        assert!(!cfg.bfill);
        assert_eq!(cfg.align, AlignPolicy::Intersect);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn source_parse_rejects_unknown_tags() {
        assert_eq!(Source::parse("stooq"), None);
        assert_eq!(Source::parse("tiingo"), Some(Source::Tiingo));
    }
}
