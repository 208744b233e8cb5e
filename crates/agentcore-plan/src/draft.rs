//! Draft parsing (§4.8): a single LLM call proposes steps; parsed as JSON
//! first, falling back to numbered-list extraction on parse failure.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use agentcore_types::{InteractivePlan, PlanStep, PlanStepStatus};

use crate::error::PlanError;

static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s*(.+)$").unwrap());

fn step_from_description(description: String) -> PlanStep {
    PlanStep {
        id: Uuid::new_v4().to_string(),
        number: 0,
        description,
        dependencies: Vec::new(),
        status: PlanStepStatus::Pending,
        is_decision_point: false,
        decision_options: Vec::new(),
        decision_choice: None,
        checkpoint_id: None,
        output: None,
    }
}

fn steps_from_json(text: &str) -> Option<Vec<PlanStep>> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    let array = value.as_array().or_else(|| value.get("steps").and_then(|v| v.as_array()))?;

    let steps: Vec<PlanStep> = array
        .iter()
        .filter_map(|item| {
            let description = item.get("description").or_else(|| item.get("step")).and_then(|v| v.as_str())?.trim().to_string();
            if description.is_empty() {
                return None;
            }
            let mut step = step_from_description(description);
            step.is_decision_point = item.get("isDecisionPoint").or_else(|| item.get("is_decision_point")).and_then(|v| v.as_bool()).unwrap_or(false);
            if let Some(options) = item.get("decisionOptions").or_else(|| item.get("decision_options")).and_then(|v| v.as_array()) {
                step.decision_options = options.iter().filter_map(|o| o.as_str().map(str::to_string)).collect();
            }
            Some(step)
        })
        .collect();

    if steps.is_empty() {
        None
    } else {
        Some(steps)
    }
}

fn steps_from_numbered_list(text: &str) -> Option<Vec<PlanStep>> {
    let steps: Vec<PlanStep> = NUMBERED_RE.captures_iter(text).map(|c| step_from_description(c.get(1).unwrap().as_str().trim().to_string())).collect();
    if steps.is_empty() {
        None
    } else {
        Some(steps)
    }
}

/// Build a draft `InteractivePlan` from raw LLM output. Numbered-list
/// extraction is the fallback when the response isn't valid JSON.
pub fn parse_draft(id: impl Into<String>, goal: impl Into<String>, raw_output: &str) -> Result<InteractivePlan, PlanError> {
    let steps = steps_from_json(raw_output).or_else(|| steps_from_numbered_list(raw_output)).ok_or(PlanError::UnparsableDraft)?;

    let mut plan = InteractivePlan::new(id, goal);
    plan.steps = steps;
    plan.renumber();
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_draft_parses_with_decision_points() {
        let raw = r#"[
            {"description": "research the providers"},
            {"description": "pick one", "isDecisionPoint": true, "decisionOptions": ["a", "b"]}
        ]"#;
        let plan = parse_draft("p1", "ship auth", raw).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[1].is_decision_point);
        assert_eq!(plan.steps[1].number, 2);
    }

    #[test]
    fn numbered_list_fallback_parses_when_json_fails() {
        let raw = "Here's the plan:\n1. research providers\n2. implement login\n3. write tests";
        let plan = parse_draft("p1", "ship auth", raw).unwrap();
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[2].number, 3);
    }

    #[test]
    fn hopeless_draft_is_an_error_not_an_empty_plan() {
        assert!(matches!(parse_draft("p1", "goal", "no structure here at all"), Err(PlanError::UnparsableDraft)));
    }
}
