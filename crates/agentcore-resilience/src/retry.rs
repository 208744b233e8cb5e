use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::ResilienceError;

/// Bounded exponential backoff with jitter (§4.1 Retry). Retries occur
/// *inside* a single breaker slot — callers obtain the breaker permit once,
/// then loop this function for the admitted attempt.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_total_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            max_total_delay: Duration::from_secs(60),
            jitter_ratio: 0.2,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as f64 * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.max_delay.as_millis() as f64);
        let jitter_span = capped * self.jitter_ratio;
        let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Run `call` up to `config.max_attempts` times, retrying only when
/// `is_retryable` accepts the error. Cumulative sleep time is capped at
/// `max_total_delay`; exceeding it surfaces `RetryBudgetExhausted` early.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut is_retryable: impl FnMut(&anyhow::Error) -> bool,
    mut call: F,
) -> Result<T, ResilienceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, anyhow::Error>>,
{
    let mut attempt = 0u32;
    let mut total_delay = Duration::ZERO;
    let mut last_error: Option<anyhow::Error> = None;

    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(ResilienceError::Cancelled("retry loop cancelled".to_string()));
        }

        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = is_retryable(&err);
                let exhausted = attempt >= config.max_attempts;
                last_error = Some(err);
                if !retryable || exhausted {
                    let last = last_error.unwrap();
                    return Err(ResilienceError::RetryBudgetExhausted {
                        attempts: attempt,
                        last_error: last.to_string(),
                    });
                }

                let delay = config.delay_for_attempt(attempt);
                total_delay += delay;
                if total_delay > config.max_total_delay {
                    let last = last_error.unwrap();
                    return Err(ResilienceError::RetryBudgetExhausted {
                        attempts: attempt,
                        last_error: last.to_string(),
                    });
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Err(ResilienceError::Cancelled("retry wait cancelled".to_string()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            &RetryConfig::default(),
            &cancel,
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, anyhow::Error>(42) }
            },
        )
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_attempts_then_fails() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_total_delay: Duration::from_secs(5),
            jitter_ratio: 0.0,
        };
        let result: Result<i32, _> = retry_with_backoff(
            &config,
            &cancel,
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, anyhow::Error>(anyhow::anyhow!("boom")) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = retry_with_backoff(
            &RetryConfig::default(),
            &cancel,
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, anyhow::Error>(anyhow::anyhow!("permanent")) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
