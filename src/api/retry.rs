// Bounded exponential backoff driven by ExchangeError classification
use std::future::Future;

use tokio::time::{sleep, Duration};

use crate::config::RetrySettings;
use crate::error::ErrorKind;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total invocations, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// Delay following `current`: doubled, capped at `max_delay`
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// Ambiguous-execution errors are never retried: the request may have taken
/// effect, so a blind resubmission could double the position.
pub async fn retry_with_backoff<T, F, Fut>(config: &RetryConfig, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay.min(config.max_delay);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("✓ {} succeeded after {} attempts", label, attempt);
                }
                return Ok(value);
            }
            Err(e) if e.kind() == ErrorKind::AmbiguousExecution => {
                tracing::warn!(
                    "{}: execution state unknown, not retrying (query the order first): {}",
                    label,
                    e
                );
                return Err(e);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    "Attempt {}/{} of {} failed: {}. Retrying in {}ms...",
                    attempt,
                    max_attempts,
                    label,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!("{} failed after {} attempts: {}", label, attempt, e);
                }
                return Err(e);
            }
        }
    }
}
