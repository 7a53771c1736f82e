use crate::error::GenError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Backoff knobs for [`with_retry`]. `max_attempts` counts total
/// invocations, not re-invocations.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: u32,
    /// Upper bound on a single attempt. An elapsed attempt surfaces as
    /// `GenError::Remote` and consumes one retry like any other failure.
    pub request_timeout: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(3000),
            backoff_multiplier: 2,
            request_timeout: None,
        }
    }
}

impl RetryOptions {
    /// No waiting between attempts. Test helper.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1,
            request_timeout: None,
        }
    }
}

/// Invokes `op` until it succeeds or the attempt budget is spent, doubling
/// the wait between attempts. Content-agnostic: every error kind is retried
/// equally, and the final error is propagated unchanged.
pub async fn with_retry<T, F, Fut>(opts: &RetryOptions, mut op: F) -> Result<T, GenError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenError>>,
{
    let attempts = opts.max_attempts.max(1);
    let mut delay = opts.initial_delay;

    for attempt in 1..=attempts {
        let result = match opts.request_timeout {
            Some(limit) => match timeout(limit, op()).await {
                Ok(r) => r,
                Err(_) => Err(GenError::Remote(format!(
                    "attempt timed out after {limit:?}"
                ))),
            },
            None => op().await,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt == attempts => return Err(e),
            Err(e) => {
                log::warn!(
                    "attempt {attempt}/{attempts} failed: {e}, retrying in {delay:?}"
                );
                sleep(delay).await;
                delay *= opts.backoff_multiplier;
            }
        }
    }

    unreachable!("loop returns on the final attempt")
}
