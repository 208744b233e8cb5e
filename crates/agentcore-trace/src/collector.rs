//! Trace collector (O): one session → one JSONL file, written through a
//! single serial queue shared with every subagent view (§4.5, §9).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use agentcore_types::{SubagentTag, TraceRecordType};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::TraceError;
use crate::writer::TraceWriter;

#[derive(Debug, Clone, Default)]
pub struct IterationAggregate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tool_call_count: u32,
    pub total_cost: f64,
    pub cache_hit_rate: f64,
}

pub struct IterationHandle {
    pub number: u32,
}

struct PendingLlm {
    model: String,
}

struct PendingTool {
    name: String,
}

/// One session's (or one subagent's) trace-writing surface. Parent and
/// subagent views share the same underlying [`TraceWriter`] — only the
/// `subagent` tag and the in-memory bookkeeping (iteration counters, pending
/// slots) differ between them.
pub struct TraceCollector {
    writer: Arc<TraceWriter>,
    trace_id: String,
    subagent: Option<SubagentTag>,
    iteration: AtomicU32,
    pending_llm: Mutex<HashMap<String, PendingLlm>>,
    pending_tool: Mutex<HashMap<String, PendingTool>>,
}

impl TraceCollector {
    pub async fn open(path: PathBuf, trace_id: impl Into<String>) -> Result<Self, TraceError> {
        let writer = TraceWriter::open(path).await?;
        Ok(Self {
            writer,
            trace_id: trace_id.into(),
            subagent: None,
            iteration: AtomicU32::new(0),
            pending_llm: Mutex::new(HashMap::new()),
            pending_tool: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &PathBuf {
        self.writer.path()
    }

    async fn write(&self, record_type: TraceRecordType, payload: Value) -> Result<(), TraceError> {
        let record = json!({
            "_type": record_type,
            "_ts": Utc::now(),
            "traceId": self.trace_id,
            "subagent": self.subagent,
            "payload": payload,
        });
        self.writer.append_line(record.to_string()).await
    }

    pub async fn record_session_start(&self, session_id: &str) -> Result<(), TraceError> {
        self.write(TraceRecordType::SessionStart, json!({ "sessionId": session_id })).await
    }

    pub async fn record_session_end(&self, session_id: &str) -> Result<(), TraceError> {
        self.write(TraceRecordType::SessionEnd, json!({ "sessionId": session_id })).await
    }

    pub async fn record_task_start(&self, task: &str) -> Result<(), TraceError> {
        self.write(TraceRecordType::TaskStart, json!({ "task": task })).await
    }

    pub async fn record_task_end(&self, task: &str, success: bool) -> Result<(), TraceError> {
        self.write(TraceRecordType::TaskEnd, json!({ "task": task, "success": success })).await
    }

    /// Open an iteration wrapper. `iteration.start` is written before this
    /// returns, so every subsequent record settles after it (§5, §8).
    pub async fn start_iteration(&self) -> Result<IterationHandle, TraceError> {
        let number = self.iteration.fetch_add(1, Ordering::SeqCst) + 1;
        self.write(TraceRecordType::IterationStart, json!({ "iteration": number })).await?;
        Ok(IterationHandle { number })
    }

    pub async fn end_iteration(&self, handle: IterationHandle, aggregate: IterationAggregate) -> Result<(), TraceError> {
        self.write(
            TraceRecordType::IterationEnd,
            json!({
                "iteration": handle.number,
                "inputTokens": aggregate.input_tokens,
                "outputTokens": aggregate.output_tokens,
                "toolCallCount": aggregate.tool_call_count,
                "totalCost": aggregate.total_cost,
                "cacheHitRate": aggregate.cache_hit_rate,
            }),
        )
        .await
    }

    /// Open a pending-request slot keyed by a freshly generated request id.
    pub async fn record_llm_request(&self, model: &str, message_count: usize) -> Result<String, TraceError> {
        let request_id = Uuid::new_v4().to_string();
        self.pending_llm.lock().await.insert(request_id.clone(), PendingLlm { model: model.to_string() });
        self.write(
            TraceRecordType::LlmRequest,
            json!({ "requestId": request_id, "model": model, "messageCount": message_count }),
        )
        .await?;
        Ok(request_id)
    }

    /// Close the pending-request slot and emit the settled response.
    pub async fn record_llm_response(
        &self,
        request_id: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cost: f64,
        stop_reason: &str,
    ) -> Result<(), TraceError> {
        let pending = self
            .pending_llm
            .lock()
            .await
            .remove(request_id)
            .ok_or_else(|| TraceError::UnknownPending(request_id.to_string()))?;
        self.write(
            TraceRecordType::LlmResponse,
            json!({
                "requestId": request_id,
                "model": pending.model,
                "inputTokens": input_tokens,
                "outputTokens": output_tokens,
                "cacheReadTokens": cache_read_tokens,
                "cost": cost,
                "stopReason": stop_reason,
            }),
        )
        .await
    }

    pub async fn record_llm_thinking(&self, request_id: &str, text: &str) -> Result<(), TraceError> {
        self.write(TraceRecordType::LlmThinking, json!({ "requestId": request_id, "text": text })).await
    }

    pub async fn record_tool_execution_start(&self, tool_call_id: &str, name: &str, args: &Value) -> Result<(), TraceError> {
        self.pending_tool.lock().await.insert(tool_call_id.to_string(), PendingTool { name: name.to_string() });
        self.write(
            TraceRecordType::ToolExecution,
            json!({ "toolCallId": tool_call_id, "name": name, "args": args, "phase": "start" }),
        )
        .await
    }

    pub async fn record_tool_execution_end(&self, tool_call_id: &str, success: bool, output: &str) -> Result<(), TraceError> {
        let pending = self
            .pending_tool
            .lock()
            .await
            .remove(tool_call_id)
            .ok_or_else(|| TraceError::UnknownPending(tool_call_id.to_string()))?;
        self.write(
            TraceRecordType::ToolExecution,
            json!({ "toolCallId": tool_call_id, "name": pending.name, "success": success, "output": output, "phase": "end" }),
        )
        .await
    }

    pub async fn record_memory_retrieval(&self, query: &str, hits: usize) -> Result<(), TraceError> {
        self.write(TraceRecordType::MemoryRetrieval, json!({ "query": query, "hits": hits })).await
    }

    pub async fn record_plan_evolution(&self, plan_id: &str, description: &str) -> Result<(), TraceError> {
        self.write(TraceRecordType::PlanEvolution, json!({ "planId": plan_id, "description": description })).await
    }

    pub async fn record_decision(&self, reason: &str, detail: &Value) -> Result<(), TraceError> {
        self.write(TraceRecordType::Decision, json!({ "reason": reason, "detail": detail })).await
    }

    pub async fn record_error(&self, kind: &str, message: &str) -> Result<(), TraceError> {
        self.write(TraceRecordType::Error, json!({ "kind": kind, "message": message })).await
    }

    /// Create a subagent view that writes into this collector's own file via
    /// the shared writer (§9). Writes the `subagent.link` record on the
    /// *parent's* collector first, so it always precedes any record the
    /// returned view goes on to emit (§8 scenario 5).
    pub async fn spawn_subagent_view(
        &self,
        subagent_id: &str,
        subagent_type: &str,
        parent_session_id: &str,
        spawned_at_iteration: u32,
    ) -> Result<TraceCollector, TraceError> {
        self.write(
            TraceRecordType::SubagentLink,
            json!({
                "subagentId": subagent_id,
                "subagentType": subagent_type,
                "parentSessionId": parent_session_id,
                "spawnedAtIteration": spawned_at_iteration,
            }),
        )
        .await?;

        Ok(TraceCollector {
            writer: self.writer.clone(),
            trace_id: self.trace_id.clone(),
            subagent: Some(SubagentTag {
                subagent_id: subagent_id.to_string(),
                subagent_type: subagent_type.to_string(),
                parent_session_id: parent_session_id.to_string(),
                spawned_at_iteration,
            }),
            iteration: AtomicU32::new(0),
            pending_llm: Mutex::new(HashMap::new()),
            pending_tool: Mutex::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn llm_request_response_pairs_through_pending_slot() {
        let dir = tempdir().unwrap();
        let collector = TraceCollector::open(dir.path().join("t.jsonl"), "trace-1").await.unwrap();
        let request_id = collector.record_llm_request("gpt-x", 3).await.unwrap();
        collector.record_llm_response(&request_id, 100, 20, 0, 0.01, "end_turn").await.unwrap();
    }

    #[tokio::test]
    async fn unsettled_request_id_is_rejected() {
        let dir = tempdir().unwrap();
        let collector = TraceCollector::open(dir.path().join("t.jsonl"), "trace-1").await.unwrap();
        let result = collector.record_llm_response("bogus", 1, 1, 0, 0.0, "end_turn").await;
        assert!(matches!(result, Err(TraceError::UnknownPending(_))));
    }

    #[tokio::test]
    async fn subagent_link_precedes_subagent_tagged_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let parent = TraceCollector::open(path.clone(), "trace-1").await.unwrap();
        parent.start_iteration().await.unwrap();
        let child = parent.spawn_subagent_view("sub-1", "researcher", "parent-session", 2).await.unwrap();
        child.record_tool_execution_start("tc-1", "read_file", &json!({})).await.unwrap();
        child.record_tool_execution_end("tc-1", true, "ok").await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let link_pos = lines.iter().position(|l| l["_type"] == "subagent_link").unwrap();
        let first_tagged_pos = lines.iter().position(|l| !l["subagent"].is_null()).unwrap();
        assert!(link_pos < first_tagged_pos);
    }

    #[tokio::test]
    async fn iteration_wrapper_brackets_its_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let collector = TraceCollector::open(path.clone(), "trace-1").await.unwrap();
        let handle = collector.start_iteration().await.unwrap();
        let request_id = collector.record_llm_request("m", 1).await.unwrap();
        collector.record_llm_response(&request_id, 10, 5, 0, 0.0, "end_turn").await.unwrap();
        collector.end_iteration(handle, IterationAggregate::default()).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let start = lines.iter().position(|l| l["_type"] == "iteration_start").unwrap();
        let end = lines.iter().position(|l| l["_type"] == "iteration_end").unwrap();
        assert!(start < end);
        for (i, line) in lines.iter().enumerate() {
            if line["_type"] == "llm_request" || line["_type"] == "llm_response" {
                assert!(i > start && i < end);
            }
        }
    }
}
