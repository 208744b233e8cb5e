use serde::{Deserialize, Serialize};

/// Running totals tracked by the economics core (B). Mirrors the provider's own
/// usage vocabulary so conversions at the boundary stay mechanical.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionUsage {
    pub tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cumulative_input_tokens: u64,
    pub cost: f64,
    pub iterations: u32,
    pub tool_calls: u32,
    pub llm_calls: u32,
    pub baseline_context_tokens: Option<u64>,
    pub last_input_tokens: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetType {
    Tokens,
    Cost,
    Iterations,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Continue,
    Warn,
    RequestExtension,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    Normal,
    Warn,
    Restricted,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    Strict,
    DoomloopOnly,
}

impl Default for EnforcementMode {
    fn default() -> Self {
        Self::Strict
    }
}

/// Result of a budget check, consulted by the kernel after every LLM call and
/// after every tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetVerdict {
    pub can_continue: bool,
    pub is_soft_limit: bool,
    pub is_hard_limit: bool,
    pub budget_type: BudgetType,
    pub suggested_action: SuggestedAction,
    pub force_text_only: bool,
    pub budget_mode: BudgetMode,
    pub allow_task_continuation: bool,
}

impl BudgetVerdict {
    pub fn healthy(budget_type: BudgetType) -> Self {
        Self {
            can_continue: true,
            is_soft_limit: false,
            is_hard_limit: false,
            budget_type,
            suggested_action: SuggestedAction::Continue,
            force_text_only: false,
            budget_mode: BudgetMode::Normal,
            allow_task_continuation: true,
        }
    }
}
