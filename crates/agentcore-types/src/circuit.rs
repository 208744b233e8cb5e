use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Observable snapshot of a single provider's circuit breaker, exposed for
/// tracing and for the §3 data model's `Circuit state` type. The breaker
/// itself (agentcore-resilience) owns the authoritative mutable state; this
/// is the read-only view handed to callers and traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitStateSnapshot {
    pub state: CircuitBreakerState,
    pub failures: u32,
    pub successes: u32,
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub last_state_change: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    pub half_open_in_progress: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
