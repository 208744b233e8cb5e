//! Resilience layer (R): circuit breaker + fallback chain + bounded retry
//! wrapped around a single provider call (§4.1).

pub mod circuit;
pub mod error;
pub mod fallback;
pub mod retry;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitPermit, TripCause, TripEligible};
pub use error::ResilienceError;
pub use fallback::{FallbackChain, ProviderHealth};
pub use retry::{retry_with_backoff, RetryConfig};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Error returned by a single provider call attempt, carrying enough
/// information for the breaker and retry loop to classify it.
#[derive(Debug)]
pub struct ProviderCallError {
    pub cause: TripCause,
    pub retryable: bool,
    pub error: anyhow::Error,
}

impl ProviderCallError {
    pub fn new(cause: TripCause, retryable: bool, error: impl Into<anyhow::Error>) -> Self {
        Self { cause, retryable, error: error.into() }
    }
}

/// Ties [`FallbackChain`] and [`RetryConfig`] together into the `execute(fn)`
/// contract of §4.1: retries happen inside a single breaker slot, and the
/// executor only advances to the next provider once that slot's retry
/// budget is exhausted or the breaker rejects it outright.
pub struct ResilientExecutor {
    chain: FallbackChain,
    retry_config: RetryConfig,
}

impl ResilientExecutor {
    pub fn new(chain: FallbackChain, retry_config: RetryConfig) -> Self {
        Self { chain, retry_config }
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut FallbackChain {
        &mut self.chain
    }

    pub async fn execute<F, Fut, T>(
        &mut self,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T, ResilienceError>
    where
        F: FnMut(&str) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderCallError>>,
    {
        let provider_ids = self.chain.provider_ids_in_order();
        if provider_ids.is_empty() {
            return Err(ResilienceError::ChainExhausted {
                attempted: 0,
                last_error: "no providers configured".to_string(),
            });
        }

        let mut attempted = 0usize;
        let mut last_error = String::new();

        for provider_id in &provider_ids {
            if cancel.is_cancelled() {
                return Err(ResilienceError::Cancelled("execution cancelled".to_string()));
            }

            let permit = {
                let breaker = self.chain.breaker_mut(provider_id).expect("slot exists");
                match breaker.try_acquire(provider_id) {
                    Ok(permit) => permit,
                    Err(_) => continue,
                }
            };
            attempted += 1;

            let timeout = self.chain.breaker_mut(provider_id).and_then(|b| b.request_timeout());
            let outcome = self.run_with_retry(provider_id, timeout, cancel, &mut call).await;

            let breaker = self.chain.breaker_mut(provider_id).expect("slot exists");
            match outcome {
                Ok(value) => {
                    breaker.record_success(permit);
                    self.chain.record_outcome(provider_id, true);
                    return Ok(value);
                }
                Err(err) => {
                    breaker.record_failure(permit, err.cause, &err.error);
                    self.chain.record_outcome(provider_id, false);
                    last_error = err.error.to_string();
                }
            }
        }

        Err(ResilienceError::ChainExhausted { attempted, last_error })
    }

    async fn run_with_retry<F, Fut, T>(
        &self,
        provider_id: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
        call: &mut F,
    ) -> Result<T, ProviderCallError>
    where
        F: FnMut(&str) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderCallError>>,
    {
        let mut attempt = 0u32;
        let mut total_delay = Duration::ZERO;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(ProviderCallError::new(
                    TripCause::Other,
                    false,
                    anyhow::anyhow!("cancelled"),
                ));
            }

            let attempt_result = match timeout {
                Some(d) => match tokio::time::timeout(d, call(provider_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderCallError::new(
                        TripCause::Timeout,
                        true,
                        anyhow::anyhow!("request timed out after {:?}", d),
                    )),
                },
                None => call(provider_id).await,
            };

            match attempt_result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let exhausted = attempt >= self.retry_config.max_attempts;
                    if !err.retryable || exhausted {
                        return Err(err);
                    }

                    let delay = self.retry_config.base_delay * 2u32.pow(attempt.saturating_sub(1));
                    let delay = delay.min(self.retry_config.max_delay);
                    total_delay += delay;
                    if total_delay > self.retry_config.max_total_delay {
                        return Err(err);
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return Err(ProviderCallError::new(
                                TripCause::Other,
                                false,
                                anyhow::anyhow!("cancelled during retry wait"),
                            ));
                        }
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

    fn chain_of(ids: &[&str]) -> FallbackChain {
        FallbackChain::new(
            ids.iter()
                .enumerate()
                .map(|(i, id)| {
                    (
                        id.to_string(),
                        i as u32,
                        CircuitBreakerConfig {
                            failure_threshold: 1,
                            reset_timeout: Duration::from_secs(9999),
                            half_open_requests: 1,
                            trip_eligible: TripEligible::All,
                            request_timeout: None,
                        },
                    )
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn succeeds_on_first_provider() {
        let mut exec = ResilientExecutor::new(chain_of(&["a", "b"]), RetryConfig::default());
        let cancel = CancellationToken::new();
        let result = exec
            .execute(&cancel, |_id| async { Ok::<_, ProviderCallError>(7) })
            .await
            .unwrap();
        assert_eq!(result, 7);
    }

    #[tokio::test]
    async fn falls_back_to_second_provider_after_first_fails() {
        let mut exec = ResilientExecutor::new(
            chain_of(&["a", "b"]),
            RetryConfig {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                max_total_delay: Duration::from_secs(1),
                jitter_ratio: 0.0,
            },
        );
        let cancel = CancellationToken::new();
        let result = exec
            .execute(&cancel, |id| async move {
                if id == "a" {
                    Err(ProviderCallError::new(TripCause::Network, false, anyhow::anyhow!("down")))
                } else {
                    Ok(99)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 99);
    }

    #[tokio::test]
    async fn chain_exhaustion_surfaces_distinguished_error() {
        let mut exec = ResilientExecutor::new(
            chain_of(&["a", "b"]),
            RetryConfig {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                max_total_delay: Duration::from_secs(1),
                jitter_ratio: 0.0,
            },
        );
        let cancel = CancellationToken::new();
        let result = exec
            .execute(&cancel, |_id| async {
                Err::<i32, _>(ProviderCallError::new(TripCause::Network, false, anyhow::anyhow!("down")))
            })
            .await;
        assert!(matches!(result, Err(ResilienceError::ChainExhausted { attempted: 2, .. })));
    }

    #[tokio::test]
    async fn retries_inside_single_breaker_slot_before_advancing() {
        let mut exec = ResilientExecutor::new(
            FallbackChain::new(vec![(
                "a".to_string(),
                0,
                CircuitBreakerConfig {
                    failure_threshold: 100,
                    reset_timeout: Duration::from_secs(9999),
                    half_open_requests: 1,
                    trip_eligible: TripEligible::All,
                    request_timeout: None,
                },
            )]),
            RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                max_total_delay: Duration::from_secs(1),
                jitter_ratio: 0.0,
            },
        );
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = exec
            .execute(&cancel, |_id| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderCallError::new(TripCause::Network, true, anyhow::anyhow!("retry me")))
                    } else {
                        Ok(1)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
