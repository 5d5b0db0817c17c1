//! Error types for the teafarm orchestrator.

/// Top-level error type for the farming system.
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    /// Unparseable input (deep link or embedded identity blob). Not retried.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Token acquisition rejected by the upstream API. Not retried.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Non-success HTTP response after transport retries were exhausted.
    #[error("request failed with HTTP {0}")]
    RequestFailed(u16),

    /// HTTP 429 surviving the transport retries on a task call.
    #[error("rate limited by upstream API")]
    RateLimited,

    /// Operation requested before the user completed bootstrap.
    #[error("no session for user {0}; send the webapp link first")]
    NoSession(i64),

    /// Transport-level failure (connect, timeout) after retries.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, FarmError>;
