//! Ties the decomposer's stages together (§4.6): parse → normalize →
//! resolve → strategy → graph → validate → conflicts, plus the
//! retry-then-heuristic-fallback LLM loop.

use agentcore_types::{DependencyGraph, Subtask, SubtaskType};

use crate::conflict::{detect_conflicts, FileConflict};
use crate::error::DecomposerError;
use crate::graph::build_graph;
use crate::normalize::normalize_all;
use crate::parser::parse_decomposition_response;
use crate::resolve::resolve_dependencies;
use crate::strategy::{apply_adaptive_wiring, select_strategy, Strategy};
use crate::validate::{validate, warnings as validation_warnings};

#[derive(Debug, Clone)]
pub struct DecompositionResult {
    pub subtasks: Vec<Subtask>,
    pub graph: DependencyGraph,
    pub conflicts: Vec<FileConflict>,
    pub warnings: Vec<String>,
    pub strategy: Strategy,
    pub reasoning: String,
}

/// Run the full pipeline over one piece of raw LLM output. Fails with
/// `DecomposerError::Invalid` when validation can't be satisfied; never
/// panics on malformed input (the parser's own fallback guarantees at
/// least one subtask reaches normalization).
pub fn decompose(raw_text: &str, explicit_strategy: Option<&str>) -> Result<DecompositionResult, DecomposerError> {
    let parsed = parse_decomposition_response(raw_text)?;
    let mut subtasks = normalize_all(&parsed.raw_subtasks);
    resolve_dependencies(&mut subtasks);

    let strategy = select_strategy(explicit_strategy, &subtasks);
    if strategy == Strategy::Adaptive {
        apply_adaptive_wiring(&mut subtasks);
    }

    let graph = build_graph(&subtasks);
    validate(&subtasks, &graph)?;
    let warnings = validation_warnings(&subtasks);
    let conflicts = detect_conflicts(&subtasks, &graph);

    Ok(DecompositionResult { subtasks, graph, conflicts, warnings, strategy, reasoning: parsed.reasoning })
}

/// A minimal decomposition built straight from the task text, with no LLM
/// involved. Used as the last resort after the retry budget is spent.
pub fn heuristic_decompose(task_text: &str) -> DecompositionResult {
    let mut phrases: Vec<String> = task_text
        .split(|c: char| c == ';' || c == '\n')
        .flat_map(|s| s.split(" and then "))
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().filter(|c| !c.is_whitespace()).count() >= 5)
        .collect();

    if phrases.is_empty() {
        phrases.push(task_text.trim().to_string());
    }
    if phrases.len() == 1 {
        phrases.push(format!("review and verify: {}", phrases[0]));
    }

    let mut subtasks: Vec<Subtask> = phrases
        .iter()
        .enumerate()
        .map(|(i, phrase)| {
            let task_type = if i + 1 == phrases.len() { SubtaskType::Test } else { SubtaskType::Implement };
            let mut subtask = Subtask::new(i.to_string(), phrase.clone(), task_type);
            if i > 0 {
                subtask.dependencies = vec![(i - 1).to_string()];
                subtask.parallelizable = false;
            }
            subtask
        })
        .collect();

    resolve_dependencies(&mut subtasks);
    let graph = build_graph(&subtasks);
    let warnings = validation_warnings(&subtasks);
    let conflicts = detect_conflicts(&subtasks, &graph);

    DecompositionResult {
        subtasks,
        graph,
        conflicts,
        warnings,
        strategy: Strategy::Sequential,
        reasoning: "heuristic fallback derived from task text after LLM loop exhausted".to_string(),
    }
}

/// The `llm.fallback` loop (§4.6): call the LLM, try to decompose its
/// output; on failure (the call itself errors, or the decomposition can't
/// validate), retry once, then fall back to a heuristic decomposition of
/// `task_text`.
pub fn decompose_with_llm_loop<F>(task_text: &str, explicit_strategy: Option<&str>, mut call_llm: F) -> DecompositionResult
where
    F: FnMut() -> anyhow::Result<String>,
{
    for attempt in 0..2 {
        let response = match call_llm() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(attempt, error = %err, "llm.fallback: provider call failed");
                continue;
            }
        };
        match decompose(&response, explicit_strategy) {
            Ok(result) => return result,
            Err(err) => {
                tracing::warn!(attempt, error = %err, "llm.fallback: decomposition did not validate");
            }
        }
    }
    heuristic_decompose(task_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_llm_output_decomposes_cleanly() {
        let text = r#"```json
        {"subtasks": [
            {"description": "research authentication providers", "type": "research"},
            {"description": "implement chosen provider", "type": "implement", "dependencies": ["0"]}
        ]}
        ```"#;
        let result = decompose(text, None).unwrap();
        assert_eq!(result.subtasks.len(), 2);
        assert!(result.graph.is_valid());
    }

    #[test]
    fn llm_loop_falls_back_to_heuristic_after_repeated_failures() {
        let mut calls = 0;
        let result = decompose_with_llm_loop("set up the database and then write the migration", None, || {
            calls += 1;
            Err(anyhow::anyhow!("provider unavailable"))
        });
        assert_eq!(calls, 2);
        assert_eq!(result.reasoning, "heuristic fallback derived from task text after LLM loop exhausted");
        assert!(result.subtasks.len() >= 2);
    }

    #[test]
    fn llm_loop_succeeds_on_second_attempt() {
        let mut calls = 0;
        let result = decompose_with_llm_loop("irrelevant", None, || {
            calls += 1;
            if calls == 1 {
                Err(anyhow::anyhow!("transient"))
            } else {
                Ok(r#"[{"description": "research the thing"}, {"description": "implement the thing"}]"#.to_string())
            }
        });
        assert_eq!(calls, 2);
        assert_eq!(result.subtasks.len(), 2);
    }

    #[test]
    fn heuristic_decompose_always_yields_at_least_two_subtasks() {
        let result = heuristic_decompose("fix the bug");
        assert!(result.subtasks.len() >= 2);
        assert!(result.graph.is_valid());
    }
}
