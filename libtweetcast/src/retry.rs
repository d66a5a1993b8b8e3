//! Rate-limit retry policy
//!
//! Only rate-limit errors are retried. The delay honours a server wait hint
//! when one was sent, otherwise it backs off exponentially with jitter:
//! `base * 2^min(retry, 5) * j` with `j` drawn from `[1.0, 1.5]`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::Result;

const MAX_EXPONENT: u32 = 5;
const MAX_JITTER: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_retry_after: Duration::from_secs(config.max_retry_after_secs),
        }
    }

    /// Exponential backoff for the given zero-based retry, with random jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(1.0..=MAX_JITTER);
        self.backoff_with_jitter(retry, jitter)
    }

    /// Saturates at `Duration::MAX` for absurdly large base delays
    pub fn backoff_with_jitter(&self, retry: u32, jitter: f64) -> Duration {
        let factor = 2u32.pow(retry.min(MAX_EXPONENT));
        let jitter = jitter.clamp(1.0, MAX_JITTER);
        self.base_delay
            .checked_mul(factor)
            .and_then(|delay| Duration::try_from_secs_f64(delay.as_secs_f64() * jitter).ok())
            .unwrap_or(Duration::MAX)
    }

    /// Delay before the given retry, preferring the server's hint
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(self.max_retry_after),
            None => self.backoff(retry),
        }
    }

    /// Run `operation` until it succeeds, fails with a non-rate-limit error,
    /// or the retry budget is spent
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match operation(retry + 1).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() && retry < self.max_retries => {
                    let delay = self.delay_for(retry, e.retry_after());
                    warn!(
                        "Rate limited (attempt {}/{}): {}. Retrying in {:?}...",
                        retry + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        warn!(
                            "Still rate limited after {} attempts, giving up",
                            retry + 1
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
