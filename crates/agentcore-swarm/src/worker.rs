//! Worker pool specs (§4.7): each worker holds its own economics instance
//! seeded from the shared budget pool, plus independent rate-limit buckets.

use agentcore_economics::{BudgetConfig, Economics};

use crate::ratelimit::{RateLimitConfig, RateLimiter};

#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub worker_id: String,
    pub model: String,
    pub capabilities: Vec<String>,
    pub token_budget: u64,
    pub throttle: RateLimitConfig,
}

impl WorkerSpec {
    pub fn new(worker_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self { worker_id: worker_id.into(), model: model.into(), capabilities: Vec::new(), token_budget: 50_000, throttle: RateLimitConfig::default() }
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|c| c == capability)
    }
}

/// A worker's live state: its spec, its own budget accounting, its rate
/// limiter, and whether it's currently running a subtask.
pub struct WorkerState {
    pub spec: WorkerSpec,
    pub economics: Economics,
    pub limiter: RateLimiter,
    pub busy: bool,
}

impl WorkerState {
    pub fn new(spec: WorkerSpec) -> Self {
        let config = BudgetConfig { max_tokens: spec.token_budget, soft_token_limit: (spec.token_budget as f64 * 0.75) as u64, ..BudgetConfig::default() };
        let limiter = RateLimiter::new(spec.throttle);
        Self { economics: Economics::new(config), limiter, busy: false, spec }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_with_no_declared_capabilities_accepts_anything() {
        let spec = WorkerSpec::new("w1", "gpt-4o-mini");
        assert!(spec.can("anything"));
    }

    #[test]
    fn worker_with_declared_capabilities_is_selective() {
        let mut spec = WorkerSpec::new("w1", "gpt-4o-mini");
        spec.capabilities = vec!["research".to_string()];
        assert!(spec.can("research"));
        assert!(!spec.can("implement"));
    }
}
