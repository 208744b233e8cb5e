//! Validation (§4.6): hard failures reject the decomposition outright;
//! warnings are surfaced to the caller but don't block execution.

use agentcore_types::{DependencyGraph, Subtask};

use crate::error::DecomposerError;

const MIN_DESCRIPTION_CHARS: usize = 5;
const MIN_SUBTASKS: usize = 2;
const HIGH_COMPLEXITY_THRESHOLD: u8 = 7;

/// Hard validation: returns `Err` when the decomposition cannot be trusted
/// at all (too few subtasks, a dependency cycle, or a description too thin
/// to mean anything).
pub fn validate(subtasks: &[Subtask], graph: &DependencyGraph) -> Result<(), DecomposerError> {
    if subtasks.len() < MIN_SUBTASKS {
        return Err(DecomposerError::Invalid(format!(
            "decomposition produced only {} subtask(s), need at least {MIN_SUBTASKS}",
            subtasks.len()
        )));
    }

    if !graph.is_valid() {
        let cycle_desc = graph.cycles.iter().map(|c| c.join(" -> ")).collect::<Vec<_>>().join("; ");
        return Err(DecomposerError::Invalid(format!("dependency cycle(s) detected: {cycle_desc}")));
    }

    for subtask in subtasks {
        if subtask.description_len() < MIN_DESCRIPTION_CHARS {
            return Err(DecomposerError::Invalid(format!(
                "subtask {} has a description too short to act on: {:?}",
                subtask.id, subtask.description
            )));
        }
    }

    Ok(())
}

/// Soft warnings: never block the decomposition, just surfaced to the caller.
pub fn warnings(subtasks: &[Subtask]) -> Vec<String> {
    let mut warnings = Vec::new();
    for subtask in subtasks {
        if subtask.complexity > HIGH_COMPLEXITY_THRESHOLD {
            warnings.push(format!(
                "subtask {} has complexity {} — consider decomposing further",
                subtask.id, subtask.complexity
            ));
        }
        if subtask.task_type.writes_relevant_files() && subtask.modifies.as_ref().map(|m| m.is_empty()).unwrap_or(true) {
            warnings.push(format!("subtask {} writes code but names no files in `modifies`", subtask.id));
        }
    }
    warnings
}
