//! Strategy selection (§4.6). The LLM may name a strategy explicitly; when
//! it doesn't, the decomposer picks `adaptive` unless every dependency
//! forms a single chain, in which case `sequential` is the honest answer.

use agentcore_types::{Subtask, SubtaskType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    Parallel,
    Hierarchical,
    Adaptive,
    Pipeline,
}

impl Strategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "hierarchical" => Some(Self::Hierarchical),
            "adaptive" => Some(Self::Adaptive),
            "pipeline" => Some(Self::Pipeline),
            _ => None,
        }
    }
}

/// A single chain: every subtask has at most one dependency and at most one
/// dependent, forming one unbranched line.
fn is_single_chain(subtasks: &[Subtask]) -> bool {
    if subtasks.is_empty() {
        return true;
    }
    subtasks.iter().all(|s| s.dependencies.len() <= 1)
        && {
            let mut dependent_counts = std::collections::HashMap::new();
            for s in subtasks {
                for dep in &s.dependencies {
                    *dependent_counts.entry(dep.clone()).or_insert(0) += 1;
                }
            }
            dependent_counts.values().all(|&count| count <= 1)
        }
}

pub fn select_strategy(explicit: Option<&str>, subtasks: &[Subtask]) -> Strategy {
    if let Some(raw) = explicit {
        if let Some(strategy) = Strategy::parse(raw) {
            return strategy;
        }
    }
    if is_single_chain(subtasks) {
        Strategy::Sequential
    } else {
        Strategy::Adaptive
    }
}

/// When `adaptive` is selected and the LLM supplied no dependencies at all,
/// synthesize the canonical wave structure: research/analysis first,
/// implementation/design/refactor depending on all of those, test/review/
/// document/integrate/deploy/merge depending on all of those.
pub fn apply_adaptive_wiring(subtasks: &mut [Subtask]) {
    if subtasks.iter().any(|s| !s.dependencies.is_empty()) {
        return;
    }

    let wave1: Vec<String> = subtasks
        .iter()
        .filter(|s| matches!(s.task_type, SubtaskType::Research | SubtaskType::Analysis))
        .map(|s| s.id.clone())
        .collect();
    let wave2: Vec<String> = subtasks
        .iter()
        .filter(|s| matches!(s.task_type, SubtaskType::Design | SubtaskType::Implement | SubtaskType::Refactor))
        .map(|s| s.id.clone())
        .collect();

    if wave1.is_empty() && wave2.is_empty() {
        return;
    }

    for subtask in subtasks.iter_mut() {
        match subtask.task_type {
            SubtaskType::Design | SubtaskType::Implement | SubtaskType::Refactor => {
                subtask.dependencies = wave1.clone();
            }
            SubtaskType::Test | SubtaskType::Review | SubtaskType::Document | SubtaskType::Integrate | SubtaskType::Deploy | SubtaskType::Merge => {
                let mut deps = wave1.clone();
                deps.extend(wave2.clone());
                deps.retain(|id| id != &subtask.id);
                subtask.dependencies = deps;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, task_type: SubtaskType) -> Subtask {
        Subtask::new(id, "description long enough", task_type)
    }

    #[test]
    fn explicit_strategy_wins_over_inference() {
        let subtasks = vec![task("a", SubtaskType::Research)];
        assert_eq!(select_strategy(Some("pipeline"), &subtasks), Strategy::Pipeline);
    }

    #[test]
    fn single_chain_infers_sequential() {
        let mut subtasks = vec![task("a", SubtaskType::Research), task("b", SubtaskType::Implement)];
        subtasks[1].dependencies = vec!["a".to_string()];
        assert_eq!(select_strategy(None, &subtasks), Strategy::Sequential);
    }

    #[test]
    fn branching_graph_infers_adaptive() {
        let mut subtasks = vec![
            task("a", SubtaskType::Research),
            task("b", SubtaskType::Design),
            task("c", SubtaskType::Implement),
        ];
        subtasks[1].dependencies = vec!["a".to_string()];
        subtasks[2].dependencies = vec!["a".to_string()];
        assert_eq!(select_strategy(None, &subtasks), Strategy::Adaptive);
    }

    #[test]
    fn adaptive_wiring_builds_three_waves() {
        let mut subtasks = vec![
            task("r1", SubtaskType::Research),
            task("i1", SubtaskType::Implement),
            task("t1", SubtaskType::Test),
        ];
        apply_adaptive_wiring(&mut subtasks);
        assert!(subtasks[1].dependencies.contains(&"r1".to_string()));
        assert!(subtasks[2].dependencies.contains(&"i1".to_string()));
    }
}
