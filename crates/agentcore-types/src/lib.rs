pub mod budget;
pub mod circuit;
pub mod error;
pub mod filechange;
pub mod plan;
pub mod provider;
pub mod runtime;
pub mod subtask;
pub mod trace;

pub use budget::{BudgetMode, BudgetType, BudgetVerdict, EnforcementMode, ExecutionUsage, SuggestedAction};
pub use circuit::{CircuitBreakerState, CircuitStateSnapshot};
pub use error::ErrorKind;
pub use filechange::{FileChange, FileOperation, StorageMode};
pub use plan::{
    InteractivePlan, InteractivePlanStatus, PendingPlan, PendingPlanStatus, PlanCheckpoint, PlanStep,
    PlanStepStatus, ProposedChange,
};
pub use provider::{ModelInfo, ModelSpec, ProviderInfo};
pub use runtime::{HostOs, HostRuntimeContext, PathStyle, ShellFamily};
pub use subtask::{DependencyGraph, Subtask, SubtaskStatus, SubtaskType};
pub use trace::{SubagentTag, TraceRecord, TraceRecordType};
