//! Bounded retry with exponential backoff for remote calls.
//!
//! Shared by the oracle client and the document-store client. Permanent
//! failures (auth, malformed request) fail immediately; transient failures
//! (connection drop, rate limit, server error) are retried with backoff.
//! The policy never swallows a terminal failure — after the final attempt
//! the last error is returned and each call site applies its own fallback.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

/// Errors that can tell the retry loop whether another attempt is worthwhile.
pub trait RetryClass: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl RetryClass for crate::error::LlmError {
    fn is_retryable(&self) -> bool {
        self.is_retryable()
    }
}

impl RetryClass for crate::error::DocError {
    fn is_retryable(&self) -> bool {
        self.is_retryable()
    }
}

/// Backoff delay for the given zero-based attempt index.
///
/// `base_delay * backoff_factor^attempt`, so delays strictly increase for
/// any factor > 1.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = config.backoff_factor.powi(attempt as i32);
    config.base_delay.mul_f64(factor)
}

/// Invoke `op` with up to `config.max_attempts` total attempts.
///
/// - Success returns immediately.
/// - A non-retryable error short-circuits without sleeping.
/// - A retryable error sleeps `backoff_delay(config, attempt)` and retries,
///   unless it was the final attempt, in which case it is returned as-is.
pub async fn call_with_retry<T, E, F, Fut>(config: &RetryConfig, op_name: &str, mut op: F) -> Result<T, E>
where
    E: RetryClass,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let last_attempt = config.max_attempts.saturating_sub(1);

    for attempt in 0..config.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => {
                tracing::error!(op = op_name, error = %err, "Non-retryable error");
                return Err(err);
            }
            Err(err) if attempt == last_attempt => {
                tracing::error!(
                    op = op_name,
                    attempts = config.max_attempts,
                    error = %err,
                    "All retry attempts failed"
                );
                return Err(err);
            }
            Err(err) => {
                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    op = op_name,
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    // max_attempts >= 1 is enforced by RetryConfig, so the loop always
    // returns from within its body.
    unreachable!("retry loop should always return from within its body")
}
