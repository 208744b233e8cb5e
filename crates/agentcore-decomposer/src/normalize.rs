//! Field-alias normalization (§4.6): LLM output names fields inconsistently
//! ("deps" vs "dependencies", "task" vs "description", "complexity" as a
//! string "high" vs a number). This module folds every alias onto the
//! canonical `Subtask` shape from `agentcore-types`.

use std::collections::BTreeSet;

use agentcore_types::{Subtask, SubtaskStatus, SubtaskType};
use serde_json::Value;

fn first_str<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
}

fn first_array<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(|v| v.as_array()))
}

fn str_set(values: Option<&Vec<Value>>) -> Option<BTreeSet<String>> {
    let values = values?;
    let set: BTreeSet<String> = values.iter().filter_map(|v| v.as_str()).map(str::to_string).collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

fn str_list(values: Option<&Vec<Value>>) -> Vec<String> {
    values
        .map(|vs| vs.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn complexity_from(obj: &serde_json::Map<String, Value>) -> u8 {
    match obj.get("complexity").or_else(|| obj.get("difficulty")) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(3).clamp(1, 10) as u8,
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "low" | "trivial" | "easy" => 2,
            "medium" | "moderate" => 5,
            "high" | "hard" => 8,
            "critical" | "very_high" => 10,
            other => other.parse::<u8>().unwrap_or(3).clamp(1, 10),
        },
        _ => 3,
    }
}

/// Normalize one raw parsed object into a `Subtask`. The `index` is used to
/// synthesize a stable id (`"0"`, `"1"`, ...) when the LLM didn't supply one,
/// matching the positional-reference convention resolved in dependency
/// resolution.
pub fn normalize_subtask(raw: &Value, index: usize) -> Subtask {
    let empty = serde_json::Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let id = first_str(obj, &["id", "taskId", "task_id"]).map(str::to_string).unwrap_or_else(|| index.to_string());

    let description = first_str(obj, &["description", "task", "title", "name", "summary"]).unwrap_or("").trim().to_string();

    let task_type_raw = first_str(obj, &["type", "task_type", "taskType", "category"]).unwrap_or("implement");
    let task_type = SubtaskType::normalize(task_type_raw);

    let dependencies = str_list(first_array(obj, &["dependencies", "deps", "dependsOn", "depends_on", "requires"]));

    let parallelizable = obj
        .get("parallelizable")
        .or_else(|| obj.get("parallel"))
        .and_then(|v| v.as_bool())
        .unwrap_or(dependencies.is_empty());

    let suggested_role = first_str(obj, &["suggestedRole", "suggested_role", "role", "agent"]).map(str::to_string);

    let mut subtask = Subtask::new(id, description, task_type);
    subtask.complexity = complexity_from(obj);
    subtask.dependencies = dependencies;
    subtask.parallelizable = parallelizable;
    subtask.status = SubtaskStatus::Pending;
    subtask.reads = str_set(first_array(obj, &["reads", "readFiles", "read_files"]));
    subtask.modifies = str_set(first_array(obj, &["modifies", "writes", "writeFiles", "write_files"]));
    subtask.relevant_files = str_set(first_array(obj, &["relevantFiles", "relevant_files", "files"]));
    subtask.suggested_role = suggested_role;

    if subtask.modifies.is_none() && subtask.task_type.writes_relevant_files() {
        subtask.modifies = subtask.relevant_files.clone();
    }

    if subtask.reads.is_none() {
        if subtask.task_type.writes_relevant_files() {
            subtask.reads = subtask.relevant_files.clone();
        } else if subtask.task_type == SubtaskType::Research {
            subtask.reads = subtask.relevant_files.clone();
        }
    }

    subtask
}

pub fn normalize_all(raw_subtasks: &[Value]) -> Vec<Subtask> {
    raw_subtasks.iter().enumerate().map(|(i, raw)| normalize_subtask(raw, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_fold_onto_canonical_fields() {
        let raw = json!({
            "task": "Research auth providers",
            "task_type": "Analyze",
            "deps": [],
            "difficulty": "high",
        });
        let subtask = normalize_subtask(&raw, 0);
        assert_eq!(subtask.description, "Research auth providers");
        assert_eq!(subtask.task_type, SubtaskType::Analysis);
        assert_eq!(subtask.complexity, 8);
    }

    #[test]
    fn missing_id_falls_back_to_positional_index() {
        let raw = json!({ "description": "x" });
        let subtask = normalize_subtask(&raw, 2);
        assert_eq!(subtask.id, "2");
    }

    #[test]
    fn implement_task_inherits_relevant_files_as_modifies_when_unset() {
        let raw = json!({
            "description": "wire up the handler",
            "type": "implement",
            "relevantFiles": ["src/handler.rs"],
        });
        let subtask = normalize_subtask(&raw, 0);
        assert_eq!(subtask.modifies, Some(BTreeSet::from(["src/handler.rs".to_string()])));
        assert_eq!(subtask.reads, Some(BTreeSet::from(["src/handler.rs".to_string()])));
    }

    #[test]
    fn research_task_inherits_relevant_files_as_reads_only() {
        let raw = json!({
            "description": "survey existing auth providers",
            "type": "research",
            "relevantFiles": ["src/auth/mod.rs", "src/auth/oidc.rs"],
        });
        let subtask = normalize_subtask(&raw, 0);
        assert_eq!(
            subtask.reads,
            Some(BTreeSet::from(["src/auth/mod.rs".to_string(), "src/auth/oidc.rs".to_string()]))
        );
        assert_eq!(subtask.modifies, None);
    }

    #[test]
    fn explicit_reads_field_is_not_overridden_by_relevant_files() {
        let raw = json!({
            "description": "document the api",
            "type": "document",
            "reads": ["src/lib.rs"],
            "relevantFiles": ["docs/api.md"],
        });
        let subtask = normalize_subtask(&raw, 0);
        assert_eq!(subtask.reads, Some(BTreeSet::from(["src/lib.rs".to_string()])));
        assert_eq!(subtask.modifies, Some(BTreeSet::from(["docs/api.md".to_string()])));
    }
}
