use std::collections::HashSet;
use std::time::Duration;

use agentcore_types::{CircuitBreakerState, CircuitStateSnapshot};
use chrono::{DateTime, Utc};

use crate::error::ResilienceError;

/// Which observed failure causes are eligible to trip the breaker
/// CLOSED → OPEN. The default configured set covers the usual suspects;
/// `All` treats every failure as trip-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripCause {
    RateLimited,
    ServerError,
    Network,
    Timeout,
    Other,
}

#[derive(Debug, Clone)]
pub enum TripEligible {
    All,
    Only(HashSet<TripCause>),
}

impl Default for TripEligible {
    fn default() -> Self {
        TripEligible::Only(
            [
                TripCause::RateLimited,
                TripCause::ServerError,
                TripCause::Network,
                TripCause::Timeout,
            ]
            .into_iter()
            .collect(),
        )
    }
}

impl TripEligible {
    fn admits(&self, cause: TripCause) -> bool {
        match self {
            TripEligible::All => true,
            TripEligible::Only(set) => set.contains(&cause),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_requests: u32,
    pub trip_eligible: TripEligible,
    pub request_timeout: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_requests: 1,
            trip_eligible: TripEligible::default(),
            request_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// A permit handed back by [`CircuitBreaker::try_acquire`]. Must be settled
/// with `record_success`/`record_failure` exactly once; dropping it without
/// settling leaks an in-flight half-open slot (callers use `execute`, below,
/// which always settles it).
pub struct CircuitPermit {
    admitted_half_open: bool,
}

/// CLOSED/OPEN/HALF_OPEN state machine for a single provider (§4.1).
///
/// Rejections during OPEN are tracked separately from `failures` and never
/// influence the state transition itself (§3 `Circuit state` invariant).
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    failures: u32,
    successes: u32,
    total_requests: u64,
    rejected_requests: u64,
    last_state_change: DateTime<Utc>,
    reset_at: Option<DateTime<Utc>>,
    half_open_in_progress: u32,
    last_error: Option<String>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failures: 0,
            successes: 0,
            total_requests: 0,
            rejected_requests: 0,
            last_state_change: Utc::now(),
            reset_at: None,
            half_open_in_progress: 0,
            last_error: None,
            config,
        }
    }

    /// Re-evaluate OPEN → HALF_OPEN against wall clock and return the
    /// current observable state.
    fn refresh_state(&mut self) -> CircuitBreakerState {
        if self.state == CircuitBreakerState::Open {
            if let Some(reset_at) = self.reset_at {
                if Utc::now() >= reset_at {
                    self.state = CircuitBreakerState::HalfOpen;
                    self.half_open_in_progress = 0;
                    self.last_state_change = Utc::now();
                }
            }
        }
        self.state
    }

    pub fn state(&mut self) -> CircuitBreakerState {
        self.refresh_state()
    }

    /// Admit or reject a call attempt. Never blocks; callers that get
    /// `CircuitOpen` should advance to the next provider in the chain.
    pub fn try_acquire(&mut self, provider_id: &str) -> Result<CircuitPermit, ResilienceError> {
        match self.refresh_state() {
            CircuitBreakerState::Closed => {
                self.total_requests += 1;
                Ok(CircuitPermit { admitted_half_open: false })
            }
            CircuitBreakerState::Open => {
                self.rejected_requests += 1;
                Err(ResilienceError::CircuitOpen { provider_id: provider_id.to_string() })
            }
            CircuitBreakerState::HalfOpen => {
                if self.half_open_in_progress >= self.config.half_open_requests {
                    self.rejected_requests += 1;
                    return Err(ResilienceError::CircuitOpen { provider_id: provider_id.to_string() });
                }
                self.half_open_in_progress += 1;
                self.total_requests += 1;
                Ok(CircuitPermit { admitted_half_open: true })
            }
        }
    }

    pub fn record_success(&mut self, permit: CircuitPermit) {
        self.successes += 1;
        match self.state {
            CircuitBreakerState::Closed => {
                self.failures = 0;
            }
            CircuitBreakerState::HalfOpen => {
                if permit.admitted_half_open {
                    self.half_open_in_progress = self.half_open_in_progress.saturating_sub(1);
                }
                // All half-open probes admitted so far succeeded and none are
                // still in flight: close the circuit.
                if self.half_open_in_progress == 0 {
                    self.state = CircuitBreakerState::Closed;
                    self.failures = 0;
                    self.reset_at = None;
                    self.last_state_change = Utc::now();
                }
            }
            CircuitBreakerState::Open => {}
        }
    }

    pub fn record_failure(&mut self, permit: CircuitPermit, cause: TripCause, error: impl ToString) {
        self.last_error = Some(error.to_string());
        if self.state == CircuitBreakerState::HalfOpen && permit.admitted_half_open {
            self.half_open_in_progress = self.half_open_in_progress.saturating_sub(1);
        }
        match self.state {
            CircuitBreakerState::HalfOpen => {
                self.trip();
            }
            CircuitBreakerState::Closed => {
                if self.config.trip_eligible.admits(cause) {
                    self.failures += 1;
                    if self.failures >= self.config.failure_threshold {
                        self.trip();
                    }
                } else {
                    // Non-trip-eligible failures still count toward successes=false
                    // bookkeeping but never move the state machine.
                }
            }
            CircuitBreakerState::Open => {}
        }
    }

    fn trip(&mut self) {
        self.state = CircuitBreakerState::Open;
        self.reset_at = Some(Utc::now() + chrono::Duration::from_std(self.config.reset_timeout).unwrap_or_default());
        self.half_open_in_progress = 0;
        self.last_state_change = Utc::now();
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.config.request_timeout
    }

    pub fn snapshot(&self) -> CircuitStateSnapshot {
        CircuitStateSnapshot {
            state: self.state,
            failures: self.failures,
            successes: self.successes,
            total_requests: self.total_requests,
            rejected_requests: self.rejected_requests,
            last_state_change: self.last_state_change,
            reset_at: self.reset_at,
            half_open_in_progress: self.half_open_in_progress,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset: Duration, half_open: u32) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
            half_open_requests: half_open,
            trip_eligible: TripEligible::All,
            request_timeout: None,
        })
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let mut cb = breaker(3, Duration::from_secs(9999), 1);
        for _ in 0..2 {
            let p = cb.try_acquire("p").unwrap();
            cb.record_failure(p, TripCause::Network, "boom");
        }
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Network, "boom");
        assert_eq!(cb.state(), CircuitBreakerState::Open);
    }

    #[test]
    fn rejects_during_open_without_affecting_failure_count() {
        let mut cb = breaker(1, Duration::from_secs(9999), 1);
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Network, "boom");
        assert_eq!(cb.state(), CircuitBreakerState::Open);
        assert!(cb.try_acquire("p").is_err());
        assert!(cb.try_acquire("p").is_err());
        let snap = cb.snapshot();
        assert_eq!(snap.rejected_requests, 2);
        assert_eq!(snap.failures, 1);
    }

    #[test]
    fn half_open_after_reset_timeout_elapses() {
        let mut cb = breaker(1, Duration::from_millis(1), 1);
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Network, "boom");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cb.state(), CircuitBreakerState::HalfOpen);
    }

    #[test]
    fn half_open_admits_at_most_configured_concurrency() {
        let mut cb = breaker(1, Duration::from_millis(1), 1);
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Network, "boom");
        std::thread::sleep(Duration::from_millis(5));
        let _permit = cb.try_acquire("p").unwrap();
        assert!(cb.try_acquire("p").is_err());
    }

    #[test]
    fn half_open_success_closes_and_resets_failures() {
        let mut cb = breaker(1, Duration::from_millis(1), 1);
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Network, "boom");
        std::thread::sleep(Duration::from_millis(5));
        let p2 = cb.try_acquire("p").unwrap();
        cb.record_success(p2);
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
        assert_eq!(cb.snapshot().failures, 0);
    }

    #[test]
    fn half_open_failure_reopens_with_new_timer() {
        let mut cb = breaker(1, Duration::from_millis(1), 1);
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Network, "boom");
        std::thread::sleep(Duration::from_millis(5));
        let p2 = cb.try_acquire("p").unwrap();
        cb.record_failure(p2, TripCause::Network, "boom again");
        assert_eq!(cb.state(), CircuitBreakerState::Open);
    }

    #[test]
    fn success_in_closed_resets_failure_counter() {
        let mut cb = breaker(3, Duration::from_secs(9999), 1);
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Network, "boom");
        let p2 = cb.try_acquire("p").unwrap();
        cb.record_success(p2);
        assert_eq!(cb.snapshot().failures, 0);
    }

    #[test]
    fn non_trip_eligible_failures_never_open_circuit() {
        let mut cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(9999),
            half_open_requests: 1,
            trip_eligible: TripEligible::Only([TripCause::RateLimited].into_iter().collect()),
            request_timeout: None,
        });
        let p = cb.try_acquire("p").unwrap();
        cb.record_failure(p, TripCause::Other, "weird");
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
    }
}
