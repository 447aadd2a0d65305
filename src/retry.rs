//! Caller-side retry with exponential backoff
//!
//! A resolve never retries internally. Callers that want retry semantics
//! wrap the whole operation in [`with_backoff`], which re-runs it only for
//! transient failures and backs off exponentially between attempts.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Whether a failure is worth retrying
pub trait IsRetryable {
    /// True when a fresh attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimitedOrTimeout(_) => true,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            // Bad input, missing credentials, missing tools, and absent
            // content do not fix themselves between attempts.
            _ => false,
        }
    }
}

fn add_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.75..1.25);
    delay.mul_f64(factor)
}

fn next_delay(current: Duration, config: &RetryConfig) -> Duration {
    current
        .mul_f64(config.backoff_multiplier)
        .min(config.max_delay)
}

/// Run `operation` up to `config.max_attempts` times, sleeping with
/// exponential backoff (and optional jitter) between attempts.
///
/// Non-retryable errors are returned immediately.
pub async fn with_backoff<T, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay;
    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let pause = if config.jitter { add_jitter(delay) } else { delay };
                warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = pause.as_millis() as u64,
                    error = %e,
                    "transient failure, backing off"
                );
                tokio::time::sleep(pause).await;
                delay = next_delay(delay, config);
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::Internal("retry budget exhausted".to_string()))
}
