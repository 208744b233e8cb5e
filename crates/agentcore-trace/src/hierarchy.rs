//! Hierarchy reconstruction (§4.5 "Hierarchy reconstruction"): a reader can
//! parse the JSONL and, grouping records by `subagentId` (null = main),
//! yield per-agent totals and a parent/child tree.

use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct AgentTotals {
    pub tool_calls: u64,
    pub llm_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: f64,
}

#[derive(Debug, Clone)]
pub struct AgentNode {
    /// `None` for the main (root) session.
    pub subagent_id: Option<String>,
    pub subagent_type: Option<String>,
    pub parent_session_id: Option<String>,
    pub totals: AgentTotals,
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyReport {
    pub agents: HashMap<String, AgentNode>,
    pub main: AgentNode,
}

fn subagent_id_of(record: &Value) -> Option<String> {
    record.get("subagent").and_then(|s| s.get("subagentId")).and_then(|v| v.as_str()).map(str::to_string)
}

/// Parse a session's JSONL trace and compute per-agent totals plus the
/// combined (main + every subagent) totals.
pub fn reconstruct_hierarchy(content: &str) -> HierarchyReport {
    let mut report = HierarchyReport {
        agents: HashMap::new(),
        main: AgentNode { subagent_id: None, subagent_type: None, parent_session_id: None, totals: AgentTotals::default() },
    };

    for line in content.lines() {
        let record: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let record_type = record.get("_type").and_then(|v| v.as_str()).unwrap_or_default();
        let payload = record.get("payload").cloned().unwrap_or(Value::Null);
        let agent_id = subagent_id_of(&record);

        let node = match &agent_id {
            None => &mut report.main,
            Some(id) => report.agents.entry(id.clone()).or_insert_with(|| AgentNode {
                subagent_id: Some(id.clone()),
                subagent_type: record.get("subagent").and_then(|s| s.get("subagentType")).and_then(|v| v.as_str()).map(str::to_string),
                parent_session_id: record.get("subagent").and_then(|s| s.get("parentSessionId")).and_then(|v| v.as_str()).map(str::to_string),
                totals: AgentTotals::default(),
            }),
        };

        match record_type {
            "tool_execution" if payload.get("phase").and_then(|v| v.as_str()) == Some("end") => {
                node.totals.tool_calls += 1;
            }
            "llm_response" => {
                node.totals.llm_calls += 1;
                node.totals.input_tokens += payload.get("inputTokens").and_then(|v| v.as_u64()).unwrap_or(0);
                node.totals.output_tokens += payload.get("outputTokens").and_then(|v| v.as_u64()).unwrap_or(0);
                node.totals.total_cost += payload.get("cost").and_then(|v| v.as_f64()).unwrap_or(0.0);
            }
            _ => {}
        }
    }

    report
}

impl HierarchyReport {
    /// Sum of the main session's totals and every subagent's totals.
    pub fn combined(&self) -> AgentTotals {
        let mut total = self.main.totals.clone();
        for node in self.agents.values() {
            total.tool_calls += node.totals.tool_calls;
            total.llm_calls += node.totals.llm_calls;
            total.input_tokens += node.totals.input_tokens;
            total.output_tokens += node.totals.output_tokens;
            total.total_cost += node.totals.total_cost;
        }
        total
    }
}
