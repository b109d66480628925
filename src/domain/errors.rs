use thiserror::Error;

/// Failure classification for `MarketDataProvider` calls.
/// Transient/rate-limited kinds are retried by the provider adapter itself;
/// the rest surface to the caller (`ScanTask`) to be recorded per-symbol.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderErrorKind {
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("unknown symbol: {0}")]
    SymbolUnknown(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderErrorKind {
    /// Whether the retry policy applies (3 attempts, exponential
    /// backoff, base 1s, factor 2, jitter ±20%).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::TransientNetwork(_)
                | ProviderErrorKind::RateLimited { .. }
                | ProviderErrorKind::Provider(_)
        )
    }
}

/// Raised when a `SignalConfig` fails its construction-time validation.
/// Fatal at startup; the process refuses to run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Raised when a scoring decision cannot be priced: the
/// computed SL or TP would be non-positive. The decision is dropped, not
/// propagated as a hard failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("signal unpriceable for {symbol}: entry={entry}, sl={sl}, tp={tp}")]
    Unpriceable {
        symbol: String,
        entry: String,
        sl: String,
        tp: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_are_exactly_network_ratelimit_provider() {
        assert!(ProviderErrorKind::TransientNetwork("x".into()).is_retryable());
        assert!(ProviderErrorKind::RateLimited { retry_after_secs: None }.is_retryable());
        assert!(ProviderErrorKind::Provider("x".into()).is_retryable());
        assert!(!ProviderErrorKind::Auth("x".into()).is_retryable());
        assert!(!ProviderErrorKind::SymbolUnknown("x".into()).is_retryable());
    }

    #[test]
    fn config_error_formatting() {
        let e = ConfigError::invalid("min_confidence", "must be in (0, 1]");
        assert!(e.to_string().contains("min_confidence"));
        assert!(e.to_string().contains("must be in (0, 1]"));
    }

    #[test]
    fn unpriceable_error_formatting() {
        let e = ScoringError::Unpriceable {
            symbol: "BTCUSDT".into(),
            entry: "100".into(),
            sl: "-5".into(),
            tp: "200".into(),
        };
        assert!(e.to_string().contains("BTCUSDT"));
    }
}
