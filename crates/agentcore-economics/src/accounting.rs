use agentcore_types::{
    BudgetMode, BudgetType, BudgetVerdict, EnforcementMode, ExecutionUsage, SuggestedAction,
};

/// The soft-token/soft-cost escalation threshold is a constant fraction of
/// the *hard* limit, independent of where `softTokenLimit`/`softCostLimit`
/// are configured (§9 open question, resolved: preserve as a named constant).
pub const SOFT_LIMIT_ESCALATION_RATIO: f64 = 0.80;

#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub enforcement_mode: EnforcementMode,
    pub max_tokens: u64,
    pub soft_token_limit: u64,
    pub max_cost: f64,
    pub soft_cost_limit: f64,
    pub max_iterations: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enforcement_mode: EnforcementMode::Strict,
            max_tokens: 200_000,
            soft_token_limit: 150_000,
            max_cost: 10.0,
            soft_cost_limit: 7.5,
            max_iterations: 100,
        }
    }
}

/// One LLM call's usage delta as reported by the provider (§6 provider contract).
#[derive(Debug, Clone, Default)]
pub struct LlmUsageDelta {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cost: Option<f64>,
}

/// The economics core (B): incremental token/cost/iteration accounting plus
/// budget verdicts (§4.2).
pub struct Economics {
    config: BudgetConfig,
    usage: ExecutionUsage,
    baseline: Option<u64>,
    effective_last_input: Option<u64>,
    baseline_refined: bool,
}

impl Economics {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            usage: ExecutionUsage::default(),
            baseline: None,
            effective_last_input: None,
            baseline_refined: false,
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub fn usage(&self) -> &ExecutionUsage {
        &self.usage
    }

    /// Switch to incremental accounting, seeding the charge baseline with an
    /// estimate of the irreducible per-call input size.
    pub fn set_baseline(&mut self, estimate: u64) {
        self.baseline = Some(estimate);
        self.effective_last_input = Some(estimate);
        self.baseline_refined = false;
        self.usage.baseline_context_tokens = Some(estimate);
    }

    pub fn is_incremental(&self) -> bool {
        self.baseline.is_some()
    }

    /// Charge one LLM call's usage. Incremental mode charges only the delta
    /// over the last observed input size (minus the cache discount);
    /// cumulative mode charges the full input each time (§4.2).
    pub fn record_llm_call(&mut self, delta: &LlmUsageDelta) {
        self.usage.llm_calls += 1;

        let input_charge = match self.effective_last_input {
            Some(last) => delta.input_tokens.saturating_sub(last),
            None => delta.input_tokens,
        };
        let discounted = input_charge.saturating_sub(delta.cache_read_tokens);

        self.usage.tokens += discounted + delta.output_tokens;
        self.usage.input_tokens += delta.input_tokens;
        self.usage.output_tokens += delta.output_tokens;
        self.usage.cumulative_input_tokens += delta.input_tokens;

        self.effective_last_input = Some(delta.input_tokens);
        self.usage.last_input_tokens = Some(delta.input_tokens);

        if self.baseline.is_some() && !self.baseline_refined {
            self.baseline = Some(delta.input_tokens);
            self.usage.baseline_context_tokens = Some(delta.input_tokens);
            self.baseline_refined = true;
        }

        if let Some(cost) = delta.cost {
            self.usage.cost += cost;
        }
    }

    pub fn record_tool_call(&mut self) {
        self.usage.tool_calls += 1;
    }

    pub fn record_iteration(&mut self) {
        self.usage.iterations += 1;
    }

    /// Evaluate the §4.2 enforcement table against current usage. Hard
    /// conditions (iterations, tokens, cost) take priority over soft ones.
    /// The kernel's first-iteration guard — not this method — is responsible
    /// for suppressing `force_text_only` before any LLM call has settled.
    pub fn check(&self) -> BudgetVerdict {
        let strict = matches!(self.config.enforcement_mode, EnforcementMode::Strict);

        if self.usage.iterations >= self.config.max_iterations {
            return BudgetVerdict {
                can_continue: false,
                is_soft_limit: false,
                is_hard_limit: true,
                budget_type: BudgetType::Iterations,
                suggested_action: SuggestedAction::Stop,
                force_text_only: true,
                budget_mode: BudgetMode::Hard,
                allow_task_continuation: false,
            };
        }

        if self.usage.tokens >= self.config.max_tokens {
            return self.hard_verdict(BudgetType::Tokens, strict);
        }
        if self.usage.cost >= self.config.max_cost {
            return self.hard_verdict(BudgetType::Cost, strict);
        }

        if self.usage.tokens >= self.config.soft_token_limit {
            let escalated = self.usage.tokens as f64
                >= self.config.max_tokens as f64 * SOFT_LIMIT_ESCALATION_RATIO;
            return self.soft_verdict(BudgetType::Tokens, strict, escalated);
        }
        if self.usage.cost >= self.config.soft_cost_limit {
            let escalated =
                self.usage.cost >= self.config.max_cost * SOFT_LIMIT_ESCALATION_RATIO;
            return self.soft_verdict(BudgetType::Cost, strict, escalated);
        }

        BudgetVerdict::healthy(BudgetType::Tokens)
    }

    fn hard_verdict(&self, budget_type: BudgetType, strict: bool) -> BudgetVerdict {
        if strict {
            BudgetVerdict {
                can_continue: false,
                is_soft_limit: false,
                is_hard_limit: true,
                budget_type,
                suggested_action: SuggestedAction::Stop,
                force_text_only: false,
                budget_mode: BudgetMode::Hard,
                allow_task_continuation: false,
            }
        } else {
            BudgetVerdict {
                can_continue: true,
                is_soft_limit: false,
                is_hard_limit: true,
                budget_type,
                suggested_action: SuggestedAction::Warn,
                force_text_only: false,
                budget_mode: BudgetMode::Warn,
                allow_task_continuation: true,
            }
        }
    }

    fn soft_verdict(&self, budget_type: BudgetType, strict: bool, escalated: bool) -> BudgetVerdict {
        if escalated {
            if strict {
                BudgetVerdict {
                    can_continue: true,
                    is_soft_limit: true,
                    is_hard_limit: false,
                    budget_type,
                    suggested_action: SuggestedAction::Stop,
                    force_text_only: true,
                    budget_mode: BudgetMode::Restricted,
                    allow_task_continuation: true,
                }
            } else {
                BudgetVerdict {
                    can_continue: true,
                    is_soft_limit: true,
                    is_hard_limit: false,
                    budget_type,
                    suggested_action: SuggestedAction::RequestExtension,
                    force_text_only: false,
                    budget_mode: BudgetMode::Warn,
                    allow_task_continuation: true,
                }
            }
        } else {
            BudgetVerdict {
                can_continue: true,
                is_soft_limit: true,
                is_hard_limit: false,
                budget_type,
                suggested_action: SuggestedAction::RequestExtension,
                force_text_only: false,
                budget_mode: BudgetMode::Warn,
                allow_task_continuation: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_accounting_survives_twenty_calls() {
        let mut econ = Economics::new(BudgetConfig {
            enforcement_mode: EnforcementMode::DoomloopOnly,
            max_tokens: 400_000,
            soft_token_limit: 300_000,
            max_cost: 1_000.0,
            soft_cost_limit: 900.0,
            max_iterations: 500,
        });
        econ.set_baseline(20_000);

        for i in 1..=20u64 {
            econ.record_llm_call(&LlmUsageDelta {
                input_tokens: 20_000 + 1500 * i,
                output_tokens: 1000,
                cache_read_tokens: 0,
                cost: None,
            });
            econ.record_iteration();
            let verdict = econ.check();
            assert!(verdict.can_continue);
            assert!(!verdict.force_text_only);
        }
        assert!(econ.usage().tokens < 200_000, "tokens = {}", econ.usage().tokens);
    }

    #[test]
    fn strict_vs_doomloop_diverge_at_soft_limit() {
        let config = BudgetConfig {
            enforcement_mode: EnforcementMode::Strict,
            max_tokens: 100_000,
            soft_token_limit: 70_000,
            max_cost: 1_000.0,
            soft_cost_limit: 900.0,
            max_iterations: 500,
        };
        let mut strict = Economics::new(config.clone());
        strict.record_llm_call(&LlmUsageDelta {
            input_tokens: 45_000,
            output_tokens: 40_000,
            cache_read_tokens: 0,
            cost: None,
        });
        let verdict = strict.check();
        assert!(verdict.is_soft_limit);
        assert!(verdict.force_text_only);
        assert!(matches!(verdict.suggested_action, SuggestedAction::Stop));

        let mut doomloop_config = config;
        doomloop_config.enforcement_mode = EnforcementMode::DoomloopOnly;
        let mut doomloop = Economics::new(doomloop_config);
        doomloop.record_llm_call(&LlmUsageDelta {
            input_tokens: 45_000,
            output_tokens: 40_000,
            cache_read_tokens: 0,
            cost: None,
        });
        let verdict = doomloop.check();
        assert!(verdict.is_soft_limit);
        assert!(!verdict.force_text_only);
        assert!(matches!(verdict.suggested_action, SuggestedAction::RequestExtension));
    }

    #[test]
    fn doomloop_only_warns_instead_of_stopping_past_hard_token_limit() {
        let mut econ = Economics::new(BudgetConfig {
            enforcement_mode: EnforcementMode::DoomloopOnly,
            max_tokens: 1_000,
            soft_token_limit: 500,
            max_cost: 1_000.0,
            soft_cost_limit: 900.0,
            max_iterations: 500,
        });
        econ.record_llm_call(&LlmUsageDelta {
            input_tokens: 900,
            output_tokens: 200,
            cache_read_tokens: 0,
            cost: None,
        });
        econ.record_iteration();
        econ.record_llm_call(&LlmUsageDelta {
            input_tokens: 2_000,
            output_tokens: 500,
            cache_read_tokens: 0,
            cost: None,
        });
        econ.record_iteration();
        let verdict = econ.check();
        assert!(verdict.can_continue);
        assert!(matches!(verdict.suggested_action, SuggestedAction::Warn));
    }

    #[test]
    fn baseline_refines_exactly_once() {
        let mut econ = Economics::new(BudgetConfig::default());
        econ.set_baseline(1000);
        econ.record_llm_call(&LlmUsageDelta {
            input_tokens: 1500,
            output_tokens: 10,
            cache_read_tokens: 0,
            cost: None,
        });
        assert_eq!(econ.usage().baseline_context_tokens, Some(1500));
        econ.record_llm_call(&LlmUsageDelta {
            input_tokens: 5000,
            output_tokens: 10,
            cache_read_tokens: 0,
            cost: None,
        });
        assert_eq!(econ.usage().baseline_context_tokens, Some(1500));
    }

    #[test]
    fn cache_discount_never_goes_below_zero() {
        let mut econ = Economics::new(BudgetConfig::default());
        econ.set_baseline(1000);
        econ.record_llm_call(&LlmUsageDelta {
            input_tokens: 1100,
            output_tokens: 0,
            cache_read_tokens: 10_000,
            cost: None,
        });
        assert_eq!(econ.usage().tokens, 0);
    }

    #[test]
    fn iterations_hard_limit_always_forces_text_only() {
        let mut econ = Economics::new(BudgetConfig {
            enforcement_mode: EnforcementMode::DoomloopOnly,
            max_iterations: 2,
            ..BudgetConfig::default()
        });
        econ.record_iteration();
        econ.record_iteration();
        let verdict = econ.check();
        assert!(verdict.force_text_only);
        assert!(!verdict.allow_task_continuation);
    }
}
