use std::collections::BTreeMap;
use std::fmt;

/// Common metadata carried by every taxonomy error.
///
/// `params` is redacted on `Display` for any key matching `/key|secret|token/i`,
/// mirroring the original extractor's `_safe_params` log-scrubbing helper.
#[derive(Debug, Default, Clone)]
pub struct ErrorMeta {
    pub source: Option<String>,
    pub symbol: Option<String>,
    pub status: Option<u16>,
    pub retry_after: Option<f64>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub params: BTreeMap<String, String>,
    pub code: Option<String>,
}

impl ErrorMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn retry_after(mut self, seconds: f64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ErrorMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = &self.source {
            write!(f, " [source={s}]")?;
        }
        if let Some(s) = &self.symbol {
            write!(f, " [symbol={s}]")?;
        }
        if let Some(s) = self.status {
            write!(f, " [status={s}]")?;
        }
        if let Some(r) = self.retry_after {
            write!(f, " [retry_after={r}]")?;
        }
        if let Some(c) = &self.code {
            write!(f, " [code={c}]")?;
        }
        if let Some(e) = &self.endpoint {
            write!(f, " [endpoint={e}]")?;
        }
        if !self.params.is_empty() {
            write!(f, " [params={{")?;
            for (i, (k, v)) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                let redacted = is_sensitive_key(k);
                if redacted {
                    write!(f, "{k}=***")?;
                } else {
                    write!(f, "{k}={v}")?;
                }
            }
            write!(f, "}}]")?;
        }
        Ok(())
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("key") || lower.contains("secret") || lower.contains("token")
}

/// Tagged error kind for the market-data pipeline. Every failure in the core
/// surfaces as exactly one of these variants.
#[derive(thiserror::Error, Debug)]
pub enum MarketDataError {
    #[error("symbol not found{meta}: {message}")]
    SymbolNotFound {
        message: String,
        meta: ErrorMeta,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("rate limit exceeded{meta}: {message}")]
    RateLimitError {
        message: String,
        meta: ErrorMeta,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("temporary network error{meta}: {message}")]
    TemporaryNetworkError {
        message: String,
        meta: ErrorMeta,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("bad request{meta}: {message}")]
    BadRequestError {
        message: String,
        meta: ErrorMeta,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("auth error{meta}: {message}")]
    AuthError {
        message: String,
        meta: ErrorMeta,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("normalization error{meta}: {message}")]
    NormalizationError {
        message: String,
        meta: ErrorMeta,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("extraction error{meta}: {message}")]
    ExtractionError {
        message: String,
        meta: ErrorMeta,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl MarketDataError {
    pub fn meta(&self) -> &ErrorMeta {
        match self {
            Self::SymbolNotFound { meta, .. }
            | Self::RateLimitError { meta, .. }
            | Self::TemporaryNetworkError { meta, .. }
            | Self::BadRequestError { meta, .. }
            | Self::AuthError { meta, .. }
            | Self::NormalizationError { meta, .. }
            | Self::ExtractionError { meta, .. } => meta,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::SymbolNotFound { message, .. }
            | Self::RateLimitError { message, .. }
            | Self::TemporaryNetworkError { message, .. }
            | Self::BadRequestError { message, .. }
            | Self::AuthError { message, .. }
            | Self::NormalizationError { message, .. }
            | Self::ExtractionError { message, .. } => message,
        }
    }

    /// Whether a retry of the underlying request might succeed.
    pub fn is_transient(&self) -> bool {
        let status_transient = matches!(
            self.meta().status,
            Some(408) | Some(425) | Some(429) | Some(500) | Some(502) | Some(503) | Some(504)
        );
        matches!(
            self,
            Self::TemporaryNetworkError { .. } | Self::RateLimitError { .. }
        ) || status_transient
    }

    pub fn symbol_not_found(message: impl Into<String>, meta: ErrorMeta) -> Self {
        Self::SymbolNotFound {
            message: message.into(),
            meta,
            cause: None,
        }
    }

    pub fn normalization(message: impl Into<String>, meta: ErrorMeta) -> Self {
        Self::NormalizationError {
            message: message.into(),
            meta,
            cause: None,
        }
    }

    pub fn extraction(message: impl Into<String>, meta: ErrorMeta) -> Self {
        Self::ExtractionError {
            message: message.into(),
            meta,
            cause: None,
        }
    }

    pub fn bad_request(message: impl Into<String>, meta: ErrorMeta) -> Self {
        Self::BadRequestError {
            message: message.into(),
            meta,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match &mut self {
            Self::SymbolNotFound { cause: c, .. }
            | Self::RateLimitError { cause: c, .. }
            | Self::TemporaryNetworkError { cause: c, .. }
            | Self::BadRequestError { cause: c, .. }
            | Self::AuthError { cause: c, .. }
            | Self::NormalizationError { cause: c, .. }
            | Self::ExtractionError { cause: c, .. } => *c = Some(cause),
        }
        self
    }
}

/// Classifies an HTTP response into the right taxonomy variant, the Rust
/// equivalent of `build_error_from_http` in the original extractor.
///
/// `retry_after_header` is the raw `Retry-After` header value, if present,
/// either a non-negative seconds count or an RFC 2822 HTTP-date.
pub fn build_error_from_http(
    message: impl Into<String>,
    source: &str,
    symbol: Option<&str>,
    status: Option<u16>,
    retry_after_header: Option<&str>,
) -> MarketDataError {
    let message = message.into();
    let retry_after = retry_after_header.and_then(parse_retry_after);

    let mut meta = ErrorMeta::new().source(source);
    if let Some(sym) = symbol {
        meta = meta.symbol(sym);
    }
    if let Some(status) = status {
        meta = meta.status(status);
    }
    if let Some(retry_after) = retry_after {
        meta = meta.retry_after(retry_after);
    }

    match status {
        Some(401) | Some(403) => MarketDataError::AuthError {
            message,
            meta,
            cause: None,
        },
        Some(400) | Some(404) | Some(422) => MarketDataError::BadRequestError {
            message,
            meta,
            cause: None,
        },
        Some(429) => MarketDataError::RateLimitError {
            message: if message.is_empty() {
                "Rate limit exceeded".to_string()
            } else {
                message
            },
            meta,
            cause: None,
        },
        Some(408) | Some(425) | Some(500) | Some(502) | Some(503) | Some(504) => {
            MarketDataError::TemporaryNetworkError {
                message,
                meta,
                cause: None,
            }
        }
        _ => MarketDataError::ExtractionError {
            message,
            meta,
            cause: None,
        },
    }
}

/// Parses a `Retry-After` header value as either a non-negative seconds
/// count or an absolute HTTP date (RFC 2822 / RFC 7231), returning seconds
/// until that date from now. Invalid values yield `None`.
fn parse_retry_after(raw: &str) -> Option<f64> {
    if let Ok(seconds) = raw.trim().parse::<f64>() {
        return Some(seconds.max(0.0));
    }
    let parsed = chrono::DateTime::parse_from_rfc2822(raw.trim()).ok()?;
    let now = chrono::Utc::now();
    let delta = parsed.with_timezone(&chrono::Utc) - now;
    Some((delta.num_milliseconds() as f64 / 1000.0).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        let e = build_error_from_http("oops", "tiingo", Some("AAPL"), Some(401), None);
        assert!(matches!(e, MarketDataError::AuthError { .. }));

        let e = build_error_from_http("oops", "tiingo", None, Some(404), None);
        assert!(matches!(e, MarketDataError::BadRequestError { .. }));

        let e = build_error_from_http("oops", "binance", None, Some(429), None);
        assert!(matches!(e, MarketDataError::RateLimitError { .. }));
        assert!(e.is_transient());

        let e = build_error_from_http("oops", "yahoo", None, Some(503), None);
        assert!(matches!(e, MarketDataError::TemporaryNetworkError { .. }));
        assert!(e.is_transient());

        let e = build_error_from_http("oops", "yahoo", None, None, None);
        assert!(matches!(e, MarketDataError::ExtractionError { .. }));
        assert!(!e.is_transient());
    }

    #[test]
    fn parses_retry_after_seconds() {
        let e = build_error_from_http("limited", "binance", None, Some(429), Some("30"));
        assert_eq!(e.meta().retry_after, Some(30.0));
    }

    #[test]
    fn ignores_garbage_retry_after() {
        let e = build_error_from_http("limited", "binance", None, Some(429), Some("not-a-date"));
        assert_eq!(e.meta().retry_after, None);
    }

    #[test]
    fn redacts_sensitive_params_on_display() {
        let mut meta = ErrorMeta::new().source("tiingo");
        meta.params.insert("token".to_string(), "abc123".to_string());
        meta.params.insert("symbol".to_string(), "AAPL".to_string());
        let rendered = meta.to_string();
        assert!(rendered.contains("token=***"));
        assert!(rendered.contains("symbol=AAPL"));
        assert!(!rendered.contains("abc123"));
    }
}
