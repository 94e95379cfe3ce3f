//! Shared plumbing for remote model backends: error classification,
//! exponential-backoff retries and client-side rate limiting.

pub mod error;
pub mod rate_limiter;
pub mod retry;

pub use error::BackendError;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;

/// Shorten an API key to a loggable prefix.
pub fn redact_key(key: &str) -> String {
    match key.get(..8) {
        Some(prefix) if key.len() > 8 => format!("{prefix}...[REDACTED]"),
        _ => "[REDACTED]".to_string(),
    }
}
