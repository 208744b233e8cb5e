use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record written into a session's append-only JSONL trace (O).
///
/// `_type`/`_ts`/`trace_id` are common to every record; `subagent` is present
/// only on records written by a subagent view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    #[serde(rename = "_type")]
    pub record_type: TraceRecordType,
    #[serde(rename = "_ts")]
    pub ts: DateTime<Utc>,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subagent: Option<SubagentTag>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceRecordType {
    SessionStart,
    SessionEnd,
    TaskStart,
    TaskEnd,
    IterationStart,
    IterationEnd,
    LlmRequest,
    LlmResponse,
    LlmThinking,
    ToolExecution,
    MemoryRetrieval,
    PlanEvolution,
    SubagentLink,
    Decision,
    Error,
}

/// Enrichment attached to every record emitted by a subagent view (§3, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentTag {
    pub subagent_id: String,
    pub subagent_type: String,
    pub parent_session_id: String,
    pub spawned_at_iteration: u32,
}
