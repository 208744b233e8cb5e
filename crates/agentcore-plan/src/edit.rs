//! Natural-language plan edits (§4.8): regex templates are tried first;
//! callers fall back to an LLM parse step (outside this crate) when
//! confidence comes back too low.

use once_cell::sync::Lazy;
use regex::Regex;

use agentcore_types::{InteractivePlan, PlanStep, PlanStepStatus};

use crate::error::PlanError;

/// A parsed edit command, before it is applied to a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    Skip { step: u32 },
    Unskip { step: u32 },
    Remove { step: u32 },
    AddBefore { anchor: u32, description: String },
    AddAfter { anchor: u32, description: String },
    Move { step: u32, to: u32 },
    Update { step: u32, description: String },
}

/// A command plus the regex layer's confidence that it parsed the user's
/// intent correctly. Below [`CONFIDENCE_THRESHOLD`] the caller should
/// delegate to an LLM parse step instead of trusting this result.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEdit {
    pub command: EditCommand,
    pub confidence: f64,
}

pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

static SKIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*skip\s+step\s+(\d+)\s*$").unwrap());
static UNSKIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*unskip\s+step\s+(\d+)\s*$").unwrap());
static REMOVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*remove\s+step\s+(\d+)\s*$").unwrap());
static ADD_BEFORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*add\s+(.+?)\s+before\s+step\s+(\d+)\s*$").unwrap());
static ADD_AFTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*add\s+(.+?)\s+after\s+step\s+(\d+)\s*$").unwrap());
static MOVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*move\s+step\s+(\d+)\s+to\s+(\d+)\s*$").unwrap());
static UPDATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*update\s+step\s+(\d+)\s+to\s+(.+?)\s*$").unwrap());

/// Try each regex template in turn. Returns `None` (not an error) when
/// nothing matches, signalling the caller should go to the LLM fallback.
pub fn parse_edit_command(text: &str) -> Option<ParsedEdit> {
    let text = text.trim();

    if let Some(c) = SKIP_RE.captures(text) {
        return Some(ParsedEdit { command: EditCommand::Skip { step: c[1].parse().ok()? }, confidence: 1.0 });
    }
    if let Some(c) = UNSKIP_RE.captures(text) {
        return Some(ParsedEdit { command: EditCommand::Unskip { step: c[1].parse().ok()? }, confidence: 1.0 });
    }
    if let Some(c) = REMOVE_RE.captures(text) {
        return Some(ParsedEdit { command: EditCommand::Remove { step: c[1].parse().ok()? }, confidence: 1.0 });
    }
    if let Some(c) = ADD_BEFORE_RE.captures(text) {
        let description = c[1].trim().to_string();
        if description.is_empty() {
            return None;
        }
        return Some(ParsedEdit { command: EditCommand::AddBefore { anchor: c[2].parse().ok()?, description }, confidence: 0.9 });
    }
    if let Some(c) = ADD_AFTER_RE.captures(text) {
        let description = c[1].trim().to_string();
        if description.is_empty() {
            return None;
        }
        return Some(ParsedEdit { command: EditCommand::AddAfter { anchor: c[2].parse().ok()?, description }, confidence: 0.9 });
    }
    if let Some(c) = MOVE_RE.captures(text) {
        return Some(ParsedEdit {
            command: EditCommand::Move { step: c[1].parse().ok()?, to: c[2].parse().ok()? },
            confidence: 1.0,
        });
    }
    if let Some(c) = UPDATE_RE.captures(text) {
        let description = c[2].trim().to_string();
        if description.is_empty() {
            return None;
        }
        return Some(ParsedEdit { command: EditCommand::Update { step: c[1].parse().ok()?, description }, confidence: 0.85 });
    }

    None
}

fn step_index(plan: &InteractivePlan, number: u32) -> Result<usize, PlanError> {
    plan.steps.iter().position(|s| s.number == number).ok_or(PlanError::NoSuchStep(number))
}

fn new_step(description: String) -> PlanStep {
    PlanStep {
        id: uuid::Uuid::new_v4().to_string(),
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

/// Apply a parsed command to a plan in place, renumbering steps contiguously
/// afterward (§3 invariant: step numbers stay `1..=N`).
pub fn apply_edit(plan: &mut InteractivePlan, command: &EditCommand) -> Result<(), PlanError> {
    match command {
        EditCommand::Skip { step } => {
            let idx = step_index(plan, *step)?;
            plan.steps[idx].status = PlanStepStatus::Skipped;
        }
        EditCommand::Unskip { step } => {
            let idx = step_index(plan, *step)?;
            if plan.steps[idx].status == PlanStepStatus::Skipped {
                plan.steps[idx].status = PlanStepStatus::Pending;
            }
        }
        EditCommand::Remove { step } => {
            let idx = step_index(plan, *step)?;
            plan.steps.remove(idx);
        }
        EditCommand::AddBefore { anchor, description } => {
            let idx = step_index(plan, *anchor)?;
            plan.steps.insert(idx, new_step(description.clone()));
        }
        EditCommand::AddAfter { anchor, description } => {
            let idx = step_index(plan, *anchor)?;
            plan.steps.insert(idx + 1, new_step(description.clone()));
        }
        EditCommand::Move { step, to } => {
            let from_idx = step_index(plan, *step)?;
            if *to == 0 || *to as usize > plan.steps.len() {
                return Err(PlanError::NoSuchStep(*to));
            }
            let moved = plan.steps.remove(from_idx);
            let to_idx = (*to as usize - 1).min(plan.steps.len());
            plan.steps.insert(to_idx, moved);
        }
        EditCommand::Update { step, description } => {
            let idx = step_index(plan, *step)?;
            plan.steps[idx].description = description.clone();
        }
    }
    plan.renumber();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_steps(n: usize) -> InteractivePlan {
        let mut plan = InteractivePlan::new("p1", "goal");
        for i in 0..n {
            let mut step = new_step(format!("step {}", i + 1));
            step.number = (i + 1) as u32;
            plan.steps.push(step);
        }
        plan
    }

    #[test]
    fn skip_step_n_parses_with_full_confidence() {
        let parsed = parse_edit_command("skip step 3").unwrap();
        assert_eq!(parsed.command, EditCommand::Skip { step: 3 });
        assert_eq!(parsed.confidence, 1.0);
    }

    #[test]
    fn add_x_before_step_n_parses() {
        let parsed = parse_edit_command("add write tests before step 2").unwrap();
        assert_eq!(parsed.command, EditCommand::AddBefore { anchor: 2, description: "write tests".to_string() });
    }

    #[test]
    fn unparseable_text_returns_none_not_error() {
        assert!(parse_edit_command("please make it better somehow").is_none());
    }

    #[test]
    fn apply_skip_then_unskip_round_trips() {
        let mut plan = plan_with_steps(3);
        apply_edit(&mut plan, &EditCommand::Skip { step: 2 }).unwrap();
        assert_eq!(plan.steps[1].status, PlanStepStatus::Skipped);
        apply_edit(&mut plan, &EditCommand::Unskip { step: 2 }).unwrap();
        assert_eq!(plan.steps[1].status, PlanStepStatus::Pending);
    }

    #[test]
    fn apply_move_renumbers_contiguously() {
        let mut plan = plan_with_steps(3);
        apply_edit(&mut plan, &EditCommand::Move { step: 1, to: 3 }).unwrap();
        let numbers: Vec<u32> = plan.steps.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(plan.steps[2].description, "step 1");
    }

    #[test]
    fn apply_remove_shrinks_and_renumbers() {
        let mut plan = plan_with_steps(3);
        apply_edit(&mut plan, &EditCommand::Remove { step: 2 }).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].description, "step 3");
        assert_eq!(plan.steps[1].number, 2);
    }

    #[test]
    fn apply_edit_on_missing_step_is_no_such_step() {
        let mut plan = plan_with_steps(2);
        assert!(matches!(apply_edit(&mut plan, &EditCommand::Skip { step: 9 }), Err(PlanError::NoSuchStep(9))));
    }
}
