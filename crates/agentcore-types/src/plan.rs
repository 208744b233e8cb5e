use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPlanStatus {
    Pending,
    Approved,
    Rejected,
    PartiallyApproved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedChange {
    pub id: String,
    pub tool: String,
    pub args: serde_json::Value,
    pub reason: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Queue of candidate writes accumulated while the kernel runs in "plan mode".
/// `status` starts and stays `pending` while changes accrue; every other
/// status is terminal (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPlan {
    pub id: String,
    pub task: String,
    pub status: PendingPlanStatus,
    pub proposed_changes: Vec<ProposedChange>,
    pub exploration_summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingPlan {
    pub fn new(id: impl Into<String>, task: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            task: task.into(),
            status: PendingPlanStatus::Pending,
            proposed_changes: Vec::new(),
            exploration_summary: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, PendingPlanStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractivePlanStatus {
    Draft,
    Discussing,
    Approved,
    Executing,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub number: u32,
    pub description: String,
    pub dependencies: Vec<u32>,
    pub status: PlanStepStatus,
    pub is_decision_point: bool,
    #[serde(default)]
    pub decision_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_choice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCheckpoint {
    pub id: String,
    pub plan_state_snapshot: serde_json::Value,
    pub before_step_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Goal-driven, checkpointed step sequence executed by the plan lifecycle (P).
/// Invariant: step numbers are contiguous `1..=N` after any edit; `current_step_index`
/// only decreases via an explicit rollback, never as a side effect of an edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractivePlan {
    pub id: String,
    pub goal: String,
    pub steps: Vec<PlanStep>,
    pub status: InteractivePlanStatus,
    pub current_step_index: usize,
    pub checkpoints: Vec<PlanCheckpoint>,
    pub discussion_history: Vec<String>,
}

impl InteractivePlan {
    pub fn new(id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            steps: Vec::new(),
            status: InteractivePlanStatus::Draft,
            current_step_index: 0,
            checkpoints: Vec::new(),
            discussion_history: Vec::new(),
        }
    }

    /// Renumber `steps` contiguously `1..=N`, preserving relative order.
    /// Must be called after any structural edit (§4.8).
    pub fn renumber(&mut self) {
        for (idx, step) in self.steps.iter_mut().enumerate() {
            step.number = (idx + 1) as u32;
        }
    }
}
