//! LLM error types with retry classification.
//!
//! Transient failures (rate limits, 5xx, dropped connections) are retried by the
//! transport; everything else is handed straight back to the caller.

use std::time::Duration;

/// Error from a chat completion request.
#[derive(Debug)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status code, if the request got that far
    pub status_code: Option<u16>,
    pub message: String,
    /// Delay requested by the provider via `Retry-After`
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
            retry_after: None,
        }
    }

    /// Build an error from a non-success HTTP response.
    pub fn from_status(status_code: u16, body: String, retry_after: Option<Duration>) -> Self {
        let mut error = Self::new(classify_http_status(status_code), Some(status_code), body);
        if error.kind == LlmErrorKind::RateLimited {
            error.retry_after = retry_after;
        }
        error
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Delay before retry attempt `attempt` (0-based).
    ///
    /// Uses `retry_after` when the provider sent one, otherwise exponential
    /// backoff from a per-kind base with a small deterministic jitter,
    /// capped at 60 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_secs: u64 = match self.kind {
            LlmErrorKind::RateLimited => 5,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        };

        let delay_secs = base_secs.saturating_mul(2u64.saturating_pow(attempt));
        let jitter_range = delay_secs / 4;
        let jitter = if jitter_range > 0 {
            (attempt as u64 * 7) % jitter_range
        } else {
            0
        };

        Duration::from_secs(delay_secs.saturating_add(jitter).min(60))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429
    RateLimited,
    /// 5xx
    ServerError,
    /// Bad request, auth, unknown model
    ClientError,
    /// Connection refused, reset or timed out
    NetworkError,
    /// Body did not match the chat completion schema
    ParseError,
}

impl LlmErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LlmErrorKind::RateLimited => "Rate limited",
            LlmErrorKind::ServerError => "Server error",
            LlmErrorKind::ClientError => "Client error",
            LlmErrorKind::NetworkError => "Network error",
            LlmErrorKind::ParseError => "Parse error",
        };
        f.write_str(label)
    }
}

/// Retry behaviour for the HTTP transport.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Upper bound on the time spent across all attempts of one request
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Never retry; useful when the caller owns the retry policy.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            max_retry_duration: Duration::ZERO,
        }
    }

    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(404), LlmErrorKind::ClientError);
    }

    #[test]
    fn test_only_transient_errors_are_retried() {
        let retry = RetryConfig::default();
        let throttled = LlmError::from_status(429, "slow down".to_string(), None);
        let unauthorized = LlmError::from_status(401, "bad key".to_string(), None);
        let garbled = LlmError::parse_error("not json".to_string());

        assert!(retry.should_retry(&throttled, 0));
        assert!(!retry.should_retry(&throttled, retry.max_retries));
        assert!(!retry.should_retry(&unauthorized, 0));
        assert!(!retry.should_retry(&garbled, 0));
        assert!(!RetryConfig::disabled().should_retry(&throttled, 0));
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let error = LlmError::from_status(503, "unavailable".to_string(), None);

        assert!(error.suggested_delay(1) > error.suggested_delay(0));
        assert!(error.suggested_delay(2) > error.suggested_delay(1));
        assert!(error.suggested_delay(12).as_secs() <= 60);
    }

    #[test]
    fn test_retry_after_only_kept_for_rate_limits() {
        let throttled =
            LlmError::from_status(429, "slow down".to_string(), Some(Duration::from_secs(30)));
        assert_eq!(throttled.suggested_delay(4), Duration::from_secs(30));

        let server =
            LlmError::from_status(502, "bad gateway".to_string(), Some(Duration::from_secs(30)));
        assert!(server.retry_after.is_none());
    }
}
