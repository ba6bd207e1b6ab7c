//! Upstream API error types with retry classification.
//!
//! Distinguishes between transient errors (should retry) and permanent errors (should not retry).

use std::time::Duration;

/// Error from an upstream generation call.
#[derive(Debug)]
pub struct LlmError {
    /// The kind of error
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
    /// Suggested retry delay (from Retry-After header or calculated)
    pub retry_after: Option<Duration>,
}

impl LlmError {
    /// Create a rate limit error.
    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            status_code: Some(429),
            message,
            retry_after,
        }
    }

    /// Create a server error.
    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::ServerError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a client error (bad request, auth, etc.).
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::ClientError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Check if this error is transient and may be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// HTTP status to report to our own callers for this error.
    ///
    /// Upstream statuses pass through; local failures (network, parse)
    /// map to 502 so clients can tell them apart from our own 4xx validation.
    pub fn gateway_status(&self) -> u16 {
        self.status_code.unwrap_or(502)
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

/// Classification of upstream errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Rate limited (429) - passed through to the caller, not retried
    RateLimited,
    /// Server error (5xx) - transient, should retry
    ServerError,
    /// Client error (400, 401, 403, 404) - permanent, should not retry
    ClientError,
    /// Network error (connection failed, timeout) - transient, should retry
    NetworkError,
    /// Response parsing error - usually permanent
    ParseError,
}

impl LlmErrorKind {
    /// Check if this error kind is transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmErrorKind::ServerError | LlmErrorKind::NetworkError)
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Configuration for retry behavior against the upstream API.
///
/// Rate limits are deliberately not retried: the upstream's 429 carries its
/// own pacing information and the caller decides what to do with it.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,
    /// Base delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied per attempt (exponential backoff)
    pub backoff_multiplier: u32,
    /// Whether to retry on server errors
    pub retry_server_errors: bool,
    /// Whether to retry on network errors
    pub retry_network_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff_multiplier: 2,
            retry_server_errors: true,
            retry_network_errors: true,
        }
    }
}

impl RetryConfig {
    /// Check if the given error should be retried based on this config.
    pub fn should_retry(&self, error: &LlmError) -> bool {
        match error.kind {
            LlmErrorKind::ServerError => self.retry_server_errors,
            LlmErrorKind::NetworkError => self.retry_network_errors,
            LlmErrorKind::RateLimited | LlmErrorKind::ClientError | LlmErrorKind::ParseError => {
                false
            }
        }
    }

    /// Delay before the retry following `attempt` (zero-based).
    ///
    /// base * multiplier^attempt, so attempt 0 waits `base_delay`,
    /// attempt 1 waits twice that, and so on. An explicit Retry-After
    /// from the error wins over the calculated delay.
    pub fn backoff_delay(&self, error: &LlmError, attempt: u32) -> Duration {
        if let Some(retry_after) = error.retry_after {
            return retry_after;
        }
        let factor = (self.backoff_multiplier as u64).saturating_pow(attempt);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis)
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500..=599 => LlmErrorKind::ServerError,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}
