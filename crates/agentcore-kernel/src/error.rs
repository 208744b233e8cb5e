use agentcore_types::ErrorKind;
use thiserror::Error;

/// The kernel's own error type. Every wrapped component error keeps its
/// `kind()` so §7's propagation policy (retry transient, surface-and-halt
/// durability, terminate-with-diagnostic internal, ...) applies uniformly
/// regardless of which subsystem raised it.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("resilience: {0}")]
    Resilience(#[from] agentcore_resilience::ResilienceError),
    #[error("economics: {0}")]
    Economics(#[from] agentcore_economics::EconomicsError),
    #[error("journal: {0}")]
    Journal(#[from] agentcore_journal::JournalError),
    #[error("trace: {0}")]
    Trace(#[from] agentcore_trace::TraceError),
    #[error("decomposer: {0}")]
    Decomposer(#[from] agentcore_decomposer::DecomposerError),
    #[error("swarm: {0}")]
    Swarm(#[from] agentcore_swarm::SwarmError),
    #[error("plan: {0}")]
    Plan(#[from] agentcore_plan::PlanError),
    #[error("tool: {0}")]
    Tool(#[from] agentcore_tools::ToolError),
    #[error("session cancelled: {0}")]
    Cancelled(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invariant violation: {0}")]
    Internal(String),
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Resilience(e) => e.kind(),
            KernelError::Economics(e) => e.kind(),
            KernelError::Journal(e) => e.kind(),
            KernelError::Trace(_) => ErrorKind::Durability,
            KernelError::Decomposer(e) => e.kind(),
            KernelError::Swarm(e) => e.kind(),
            KernelError::Plan(e) => e.kind(),
            KernelError::Tool(e) => match e {
                agentcore_tools::ToolError::Cancelled => ErrorKind::Policy,
                agentcore_tools::ToolError::UnknownTool(_) | agentcore_tools::ToolError::InvalidArgs { .. } => ErrorKind::Input,
                agentcore_tools::ToolError::Io(_) => ErrorKind::Durability,
            },
            KernelError::Cancelled(_) => ErrorKind::Policy,
            KernelError::Database(_) | KernelError::Io(_) => ErrorKind::Durability,
            KernelError::Internal(_) => ErrorKind::Internal,
        }
    }
}
