//! Dependency reference resolution (§4.6, §8 scenario 3). The LLM is free to
//! reference a dependency by exact id, by positional index ("0", "1", ...),
//! or by a fragment of the target's description. Resolution tries each tier
//! in order; a reference that matches nothing, or that would make a subtask
//! depend on itself, is silently dropped rather than rejected — the spec's
//! resolved Open Question: unresolved references degrade the edge, they
//! don't fail the whole decomposition.

use once_cell::sync::Lazy;
use regex::Regex;

use agentcore_types::Subtask;

static TASK_N_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:task|subtask|st)-(\d+)$").unwrap());

fn resolve_one(reference: &str, self_id: &str, subtasks: &[Subtask]) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    // Tier 1: exact id match.
    if let Some(s) = subtasks.iter().find(|s| s.id == reference) {
        if s.id != self_id {
            return Some(s.id.clone());
        }
    }

    // Tier 2: positional index ("0" means subtasks[0]).
    if let Ok(idx) = reference.parse::<usize>() {
        if let Some(s) = subtasks.get(idx) {
            if s.id != self_id {
                return Some(s.id.clone());
            }
        }
    }

    // Tier 3: `task-N|subtask-N|st-N` — also a positional index.
    if let Some(caps) = TASK_N_RE.captures(reference) {
        if let Ok(idx) = caps[1].parse::<usize>() {
            if let Some(s) = subtasks.get(idx) {
                if s.id != self_id {
                    return Some(s.id.clone());
                }
            }
        }
    }

    // Tier 4: case-insensitive substring match against description.
    let needle = reference.to_lowercase();
    let by_description: Vec<&Subtask> = subtasks
        .iter()
        .filter(|s| s.id != self_id && s.description.to_lowercase().contains(&needle))
        .collect();
    if by_description.len() == 1 {
        return Some(by_description[0].id.clone());
    }

    // Tier 5: reference's own id case-insensitively (LLMs sometimes vary case).
    if let Some(s) = subtasks.iter().find(|s| s.id != self_id && s.id.eq_ignore_ascii_case(reference)) {
        return Some(s.id.clone());
    }

    None
}

/// Resolve every subtask's raw `dependencies` list against the full set,
/// in place. Unresolved references and self-references are dropped;
/// duplicates collapse.
pub fn resolve_dependencies(subtasks: &mut [Subtask]) {
    let snapshot = subtasks.to_vec();
    for subtask in subtasks.iter_mut() {
        let mut resolved: Vec<String> = Vec::new();
        for reference in &subtask.dependencies {
            if let Some(id) = resolve_one(reference, &subtask.id, &snapshot) {
                if !resolved.contains(&id) {
                    resolved.push(id);
                }
            }
        }
        subtask.dependencies = resolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::SubtaskType;

    fn task(id: &str, description: &str) -> Subtask {
        Subtask::new(id, description, SubtaskType::Implement)
    }

    #[test]
    fn mixed_reference_styles_all_resolve() {
        let mut subtasks = vec![
            task("0", "Research authentication methods"),
            task("task-1", "Design the schema"),
            task("task-2", "Implement login endpoint"),
        ];
        subtasks[2].dependencies = vec!["0".to_string(), "task-1".to_string(), "Research authentication methods".to_string()];

        resolve_dependencies(&mut subtasks);

        let mut deps = subtasks[2].dependencies.clone();
        deps.sort();
        assert_eq!(deps, vec!["0".to_string(), "task-1".to_string()]);
    }

    #[test]
    fn unresolvable_and_self_references_drop_to_empty() {
        let mut subtasks = vec![task("self-id", "do the thing")];
        subtasks[0].dependencies = vec!["nonexistent".to_string(), "self-id".to_string()];

        resolve_dependencies(&mut subtasks);

        assert!(subtasks[0].dependencies.is_empty());
    }

    #[test]
    fn ambiguous_description_match_is_dropped_not_guessed() {
        let mut subtasks = vec![task("a", "write the tests"), task("b", "write the docs"), task("c", "finalize")];
        subtasks[2].dependencies = vec!["write the".to_string()];

        resolve_dependencies(&mut subtasks);

        assert!(subtasks[2].dependencies.is_empty());
    }
}
