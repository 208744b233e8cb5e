//! Shared budget pool (§4.7): the parent keeps a reserve and dynamically
//! hands out slices of the remainder to children as they spawn.

use std::collections::HashMap;

use crate::error::SwarmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Re-weights `max_remaining_ratio` for higher-priority children so they
    /// can claim a larger slice of what's left.
    fn ratio_multiplier(self) -> f64 {
        match self {
            Priority::Low => 0.75,
            Priority::Normal => 1.0,
            Priority::High => 1.2,
            Priority::Critical => 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BudgetPoolConfig {
    /// Fraction of the parent's total budget the parent keeps for itself.
    pub reserve_ratio: f64,
    /// Fraction of what's left a single child may claim, before priority
    /// re-weighting.
    pub max_remaining_ratio: f64,
    pub max_per_child: u64,
    pub expected_children: usize,
    /// Below this allocation, prefer deferring the spawn over starving it.
    pub starvation_floor: u64,
}

impl Default for BudgetPoolConfig {
    fn default() -> Self {
        Self {
            reserve_ratio: 0.2,
            max_remaining_ratio: 0.4,
            max_per_child: 50_000,
            expected_children: 4,
            starvation_floor: 2_000,
        }
    }
}

#[derive(Debug)]
pub struct SharedBudgetPool {
    config: BudgetPoolConfig,
    pool_remaining: u64,
    spawned_count: usize,
    reservations: HashMap<String, u64>,
}

impl SharedBudgetPool {
    pub fn new(parent_total_tokens: u64, config: BudgetPoolConfig) -> Self {
        let pool_total = (parent_total_tokens as f64 * (1.0 - config.reserve_ratio)).floor() as u64;
        Self { config, pool_remaining: pool_total, spawned_count: 0, reservations: HashMap::new() }
    }

    pub fn pool_remaining(&self) -> u64 {
        self.pool_remaining
    }

    /// `min(maxPerChild, min(poolRemaining × maxRemainingRatio, poolRemaining
    /// ÷ max(1, expectedChildren - spawnedCount)))`, with the ratio
    /// re-weighted by `priority` (§4.7).
    pub fn reserve_dynamic(&mut self, child_id: &str, priority: Priority) -> Result<u64, SwarmError> {
        let remaining_children = self.config.expected_children.saturating_sub(self.spawned_count).max(1) as f64;
        let effective_ratio = (self.config.max_remaining_ratio * priority.ratio_multiplier()).min(1.0);

        let by_ratio = self.pool_remaining as f64 * effective_ratio;
        let by_fair_share = self.pool_remaining as f64 / remaining_children;
        let amount = by_ratio.min(by_fair_share).min(self.config.max_per_child as f64).floor() as u64;

        if amount < self.config.starvation_floor {
            return Err(SwarmError::StarvationDeferred { child_id: child_id.to_string() });
        }

        self.pool_remaining = self.pool_remaining.saturating_sub(amount);
        self.spawned_count += 1;
        self.reservations.insert(child_id.to_string(), amount);
        Ok(amount)
    }

    /// Return whatever a child didn't spend back to the pool.
    pub fn release_dynamic(&mut self, child_id: &str, spent: u64) {
        if let Some(reserved) = self.reservations.remove(child_id) {
            self.pool_remaining += reserved.saturating_sub(spent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_priority_claims_a_bigger_slice_than_normal_when_ratio_binds() {
        // expected_children = 1 makes the fair-share term generous enough
        // that the priority-weighted ratio term is what actually binds.
        let config = BudgetPoolConfig { max_remaining_ratio: 0.3, max_per_child: u64::MAX, expected_children: 1, starvation_floor: 0, ..Default::default() };
        let mut critical_pool = SharedBudgetPool::new(100_000, config.clone());
        let mut normal_pool = SharedBudgetPool::new(100_000, config);

        let critical = critical_pool.reserve_dynamic("c", Priority::Critical).unwrap();
        let normal = normal_pool.reserve_dynamic("n", Priority::Normal).unwrap();
        assert!(critical > normal);
    }

    #[test]
    fn fair_share_shrinks_as_more_children_spawn() {
        let mut pool = SharedBudgetPool::new(100_000, BudgetPoolConfig { max_remaining_ratio: 1.0, max_per_child: u64::MAX, ..Default::default() });
        let first = pool.reserve_dynamic("a", Priority::Normal).unwrap();
        let second = pool.reserve_dynamic("b", Priority::Normal).unwrap();
        assert!(second <= first);
    }

    #[test]
    fn release_returns_unspent_budget_to_the_pool() {
        let mut pool = SharedBudgetPool::new(100_000, BudgetPoolConfig::default());
        let before = pool.pool_remaining();
        let reserved = pool.reserve_dynamic("a", Priority::Normal).unwrap();
        pool.release_dynamic("a", reserved / 2);
        assert_eq!(pool.pool_remaining(), before - reserved + reserved / 2);
    }

    #[test]
    fn starvation_floor_defers_rather_than_underprovision() {
        let mut pool = SharedBudgetPool::new(1_000, BudgetPoolConfig { starvation_floor: 5_000, ..Default::default() });
        let result = pool.reserve_dynamic("a", Priority::Low);
        assert!(matches!(result, Err(SwarmError::StarvationDeferred { .. })));
    }
}
