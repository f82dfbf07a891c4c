//! Retry logic with exponential backoff
//!
//! Used by the upstream transport for rate-limit and server-error responses.
//! Per-page retry in the report assembler follows its own linear schedule
//! (see [`LinearBackoff`](crate::config::LinearBackoff)).
//!
//! # Example
//!
//! ```no_run
//! use nsfc_report_dl::retry::{IsRetryable, with_retry};
//! use nsfc_report_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Busy,
//!     Rejected,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Busy)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{DEFAULT_RETRY_STATUSES, RetryConfig};
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, throttling, upstream 5xx) return `true`.
/// Everything that will fail again the same way returns `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Without a [`RetryConfig`] at hand, HTTP statuses are judged against
/// [`DEFAULT_RETRY_STATUSES`]. The transport applies its configured list instead.
impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::HttpStatus { status, .. } => DEFAULT_RETRY_STATUSES.contains(status),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Upstream(_)
            | Error::Document(_)
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Config { .. }
            | Error::Serialization(_)
            | Error::NotFound(_)
            | Error::Validation(_)
            | Error::BuildInProgress { .. }
            | Error::ShuttingDown
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff, retrying errors
/// whose [`IsRetryable::is_retryable`] is true
///
/// `config.max_attempts` counts retries, so the operation runs at most
/// `max_attempts + 1` times.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    with_retry_if(config, |e: &E| e.is_retryable(), operation).await
}

/// Like [`with_retry`] but with a caller-supplied classification
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if retryable(&e) && attempt < config.max_attempts => {
                attempt += 1;

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    "transient failure, retrying"
                );
                tokio::time::sleep(wait).await;

                let next = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next.min(config.max_delay);
            }
            Err(e) => {
                if retryable(&e) {
                    tracing::warn!(error = %e, attempts = attempt + 1, "retries exhausted");
                }
                return Err(e);
            }
        }
    }
}

/// Jitter is uniform in [0%, 100%] of the delay
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}
