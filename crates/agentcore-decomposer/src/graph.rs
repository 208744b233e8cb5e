//! Dependency graph construction (§4.6): cycle detection, topological order,
//! and "parallel waves" — batches of subtasks that could all run at once
//! given what's already completed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use agentcore_types::{DependencyGraph, Subtask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InStack,
    Done,
}

/// DFS-based cycle detection via a recursion stack. Returns every cycle
/// found, each as the ordered list of ids that form the loop.
fn detect_cycles(dependencies: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut cycles = Vec::new();

    fn visit<'a>(
        id: &'a str,
        dependencies: &'a BTreeMap<String, Vec<String>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<String>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        if let Some(Mark::Done) = marks.get(id) {
            return;
        }
        if let Some(Mark::InStack) = marks.get(id) {
            if let Some(start) = stack.iter().position(|n| n == id) {
                let mut cycle: Vec<String> = stack[start..].to_vec();
                cycle.push(id.to_string());
                cycles.push(cycle);
            }
            return;
        }

        marks.insert(id, Mark::InStack);
        stack.push(id.to_string());
        if let Some(deps) = dependencies.get(id) {
            for dep in deps {
                visit(dep.as_str(), dependencies, marks, stack, cycles);
            }
        }
        stack.pop();
        marks.insert(id, Mark::Done);
    }

    let mut ids: Vec<&str> = dependencies.keys().map(String::as_str).collect();
    ids.sort();
    for id in ids {
        visit(id, dependencies, &mut marks, &mut stack, &mut cycles);
    }
    cycles
}

/// Reverse-post-order DFS topological sort. Nodes inside a cycle are still
/// visited (post-order on a graph with cycles just yields *a* order, not
/// necessarily a valid one for those nodes) — callers must check
/// `DependencyGraph::is_valid()` before trusting `execution_order`.
fn topological_order(dependencies: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();

    fn visit(id: &str, dependencies: &BTreeMap<String, Vec<String>>, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if !visited.insert(id.to_string()) {
            return;
        }
        if let Some(deps) = dependencies.get(id) {
            for dep in deps {
                visit(dep, dependencies, visited, order);
            }
        }
        order.push(id.to_string());
    }

    let mut ids: Vec<&String> = dependencies.keys().collect();
    ids.sort();
    for id in ids {
        visit(id, dependencies, &mut visited, &mut order);
    }
    order
}

/// Partition subtasks into parallel waves: repeatedly extract every subtask
/// whose dependencies are all already in an earlier wave. Any residue left
/// after no further progress (i.e. subtasks caught in a cycle) is emitted as
/// singleton waves in id order, so every subtask still appears exactly once.
fn parallel_waves(ids: &[String], dependencies: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut remaining: BTreeSet<String> = ids.iter().cloned().collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut waves: Vec<Vec<String>> = Vec::new();

    loop {
        let ready: Vec<String> = remaining
            .iter()
            .filter(|id| dependencies.get(id.as_str()).map(|deps| deps.iter().all(|d| placed.contains(d))).unwrap_or(true))
            .cloned()
            .collect();

        if ready.is_empty() {
            break;
        }
        for id in &ready {
            remaining.remove(id);
            placed.insert(id.clone());
        }
        waves.push(ready);
    }

    for id in remaining {
        waves.push(vec![id]);
    }
    waves
}

/// Build the full `DependencyGraph` from a normalized, dependency-resolved
/// subtask list.
pub fn build_graph(subtasks: &[Subtask]) -> DependencyGraph {
    let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut ids: Vec<String> = Vec::new();

    for subtask in subtasks {
        ids.push(subtask.id.clone());
        dependencies.entry(subtask.id.clone()).or_default().extend(subtask.dependencies.iter().cloned());
        dependents.entry(subtask.id.clone()).or_default();
    }
    for subtask in subtasks {
        for dep in &subtask.dependencies {
            dependents.entry(dep.clone()).or_default().push(subtask.id.clone());
        }
    }

    let cycles = detect_cycles(&dependencies);
    let execution_order = topological_order(&dependencies);
    let parallel_groups = parallel_waves(&ids, &dependencies);

    DependencyGraph { dependencies, dependents, execution_order, parallel_groups, cycles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::SubtaskType;

    fn task(id: &str, deps: &[&str]) -> Subtask {
        let mut t = Subtask::new(id, "d", SubtaskType::Implement);
        t.dependencies = deps.iter().map(|s| s.to_string()).collect();
        t
    }

    #[test]
    fn linear_chain_produces_three_singleton_waves() {
        let subtasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["b"])];
        let graph = build_graph(&subtasks);
        assert!(graph.is_valid());
        assert_eq!(graph.parallel_groups, vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn independent_tasks_share_one_wave() {
        let subtasks = vec![task("a", &[]), task("b", &[]), task("c", &["a", "b"])];
        let graph = build_graph(&subtasks);
        assert!(graph.is_valid());
        assert_eq!(graph.parallel_groups.len(), 2);
        assert_eq!(graph.parallel_groups[0].len(), 2);
    }

    #[test]
    fn cycle_is_detected_and_every_node_still_appears_once() {
        let subtasks = vec![task("a", &["b"]), task("b", &["a"])];
        let graph = build_graph(&subtasks);
        assert!(!graph.is_valid());
        assert!(!graph.cycles.is_empty());
        let total: usize = graph.parallel_groups.iter().map(|w| w.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn dependents_is_the_reverse_adjacency_of_dependencies() {
        let subtasks = vec![task("a", &[]), task("b", &["a"])];
        let graph = build_graph(&subtasks);
        assert_eq!(graph.dependents.get("a").unwrap(), &vec!["b".to_string()]);
    }
}
