use std::collections::{HashMap, VecDeque};

use crate::circuit::{CircuitBreaker, CircuitBreakerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

const HEALTH_WINDOW: usize = 20;
const DEGRADED_THRESHOLD: f64 = 0.8;
const UNHEALTHY_THRESHOLD: f64 = 0.5;

struct ProviderSlot {
    provider_id: String,
    priority: u32,
    breaker: CircuitBreaker,
    recent_outcomes: VecDeque<bool>,
}

impl ProviderSlot {
    fn record_outcome(&mut self, success: bool) {
        self.recent_outcomes.push_back(success);
        if self.recent_outcomes.len() > HEALTH_WINDOW {
            self.recent_outcomes.pop_front();
        }
    }

    fn success_rate(&self) -> f64 {
        if self.recent_outcomes.is_empty() {
            return 1.0;
        }
        let successes = self.recent_outcomes.iter().filter(|o| **o).count();
        successes as f64 / self.recent_outcomes.len() as f64
    }

    fn health(&self) -> ProviderHealth {
        let rate = self.success_rate();
        if rate >= DEGRADED_THRESHOLD {
            ProviderHealth::Healthy
        } else if rate >= UNHEALTHY_THRESHOLD {
            ProviderHealth::Degraded
        } else {
            ProviderHealth::Unhealthy
        }
    }
}

/// Ordered providers with attached breakers (§4.1 Fallback chain). Dispatch
/// always starts from the highest-priority provider whose breaker admits a
/// request; on failure the executor advances to the next slot.
pub struct FallbackChain {
    slots: Vec<ProviderSlot>,
}

impl FallbackChain {
    pub fn new(providers: Vec<(String, u32, CircuitBreakerConfig)>) -> Self {
        let mut slots: Vec<ProviderSlot> = providers
            .into_iter()
            .map(|(provider_id, priority, config)| ProviderSlot {
                provider_id,
                priority,
                breaker: CircuitBreaker::new(config),
                recent_outcomes: VecDeque::with_capacity(HEALTH_WINDOW),
            })
            .collect();
        slots.sort_by_key(|s| s.priority);
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn provider_ids_in_order(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.provider_id.clone()).collect()
    }

    pub fn breaker_mut(&mut self, provider_id: &str) -> Option<&mut CircuitBreaker> {
        self.slots.iter_mut().find(|s| s.provider_id == provider_id).map(|s| &mut s.breaker)
    }

    pub fn record_outcome(&mut self, provider_id: &str, success: bool) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.provider_id == provider_id) {
            slot.record_outcome(success);
        }
    }

    pub fn health(&self) -> HashMap<String, ProviderHealth> {
        self.slots.iter().map(|s| (s.provider_id.clone(), s.health())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> FallbackChain {
        FallbackChain::new(vec![
            ("a".to_string(), 0, CircuitBreakerConfig::default()),
            ("b".to_string(), 1, CircuitBreakerConfig::default()),
        ])
    }

    #[test]
    fn orders_by_priority() {
        let c = chain();
        assert_eq!(c.provider_ids_in_order(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn tracks_health_from_recent_outcomes() {
        let mut c = chain();
        for _ in 0..10 {
            c.record_outcome("a", false);
        }
        assert_eq!(c.health()["a"], ProviderHealth::Unhealthy);
        assert_eq!(c.health()["b"], ProviderHealth::Healthy);
    }
}
