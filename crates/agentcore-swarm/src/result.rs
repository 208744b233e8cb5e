//! Result aggregation (§4.7): each worker returns a typed result; the
//! synthesizer merges outputs and reconciles conflicting file edits.

use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SwarmTaskResult {
    pub worker_id: String,
    pub subtask_id: String,
    pub files_changed: Vec<String>,
    pub text_output: String,
    pub sub_findings: Vec<String>,
    pub complexity: u8,
    pub completed_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolutionPolicy {
    /// Default: the worker that finished last wins the file.
    PreferLaterCompleting,
    /// The subtask with higher declared complexity wins.
    PreferHigherComplexity,
    /// Neither wins outright — surfaced as an unresolved conflict for an
    /// LLM-mediated merge step the kernel drives.
    LlmMediatedMerge,
}

#[derive(Debug, Clone)]
pub struct FileOwnership {
    pub path: String,
    pub owner_subtask_id: String,
    pub owner_worker_id: String,
}

#[derive(Debug, Clone)]
pub struct UnresolvedMerge {
    pub path: String,
    pub contenders: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SynthesisReport {
    pub file_ownership: Vec<FileOwnership>,
    pub unresolved_merges: Vec<UnresolvedMerge>,
    pub text_outputs: Vec<String>,
    pub findings: Vec<String>,
}

/// Merge every worker's result. Same-file collisions are reconciled per
/// `policy`; `LlmMediatedMerge` never picks a winner on its own — it
/// records every contender so the kernel can drive an actual merge step.
pub fn synthesize(results: &[SwarmTaskResult], policy: ConflictResolutionPolicy) -> SynthesisReport {
    let mut report = SynthesisReport::default();
    let mut owners: BTreeMap<String, &SwarmTaskResult> = BTreeMap::new();
    let mut contenders: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for result in results {
        report.text_outputs.push(result.text_output.clone());
        report.findings.extend(result.sub_findings.iter().cloned());

        for path in &result.files_changed {
            contenders.entry(path.clone()).or_default().push(result.subtask_id.clone());

            match owners.get(path) {
                None => {
                    owners.insert(path.clone(), result);
                }
                Some(current) => {
                    let replace = match policy {
                        ConflictResolutionPolicy::PreferLaterCompleting => result.completed_at > current.completed_at,
                        ConflictResolutionPolicy::PreferHigherComplexity => result.complexity > current.complexity,
                        ConflictResolutionPolicy::LlmMediatedMerge => false,
                    };
                    if replace {
                        owners.insert(path.clone(), result);
                    }
                }
            }
        }
    }

    for (path, owner) in &owners {
        let contenders_for_path = &contenders[path];
        if policy == ConflictResolutionPolicy::LlmMediatedMerge && contenders_for_path.len() > 1 {
            report.unresolved_merges.push(UnresolvedMerge { path: path.clone(), contenders: contenders_for_path.clone() });
        } else {
            report.file_ownership.push(FileOwnership { path: path.clone(), owner_subtask_id: owner.subtask_id.clone(), owner_worker_id: owner.worker_id.clone() });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(worker_id: &str, subtask_id: &str, files: &[&str], complexity: u8, delay_ms: u64) -> SwarmTaskResult {
        SwarmTaskResult {
            worker_id: worker_id.to_string(),
            subtask_id: subtask_id.to_string(),
            files_changed: files.iter().map(|s| s.to_string()).collect(),
            text_output: String::new(),
            sub_findings: Vec::new(),
            complexity,
            completed_at: Instant::now() + Duration::from_millis(delay_ms),
        }
    }

    #[test]
    fn later_completing_worker_wins_by_default() {
        let results = vec![result("w1", "a", &["src/lib.rs"], 3, 0), result("w2", "b", &["src/lib.rs"], 3, 100)];
        let report = synthesize(&results, ConflictResolutionPolicy::PreferLaterCompleting);
        assert_eq!(report.file_ownership[0].owner_subtask_id, "b");
    }

    #[test]
    fn higher_complexity_worker_wins_when_configured() {
        let results = vec![result("w1", "a", &["src/lib.rs"], 8, 100), result("w2", "b", &["src/lib.rs"], 3, 0)];
        let report = synthesize(&results, ConflictResolutionPolicy::PreferHigherComplexity);
        assert_eq!(report.file_ownership[0].owner_subtask_id, "a");
    }

    #[test]
    fn llm_mediated_policy_surfaces_every_contender_instead_of_picking() {
        let results = vec![result("w1", "a", &["src/lib.rs"], 3, 0), result("w2", "b", &["src/lib.rs"], 3, 10)];
        let report = synthesize(&results, ConflictResolutionPolicy::LlmMediatedMerge);
        assert!(report.file_ownership.is_empty());
        assert_eq!(report.unresolved_merges.len(), 1);
        assert_eq!(report.unresolved_merges[0].contenders.len(), 2);
    }

    #[test]
    fn disjoint_files_never_conflict() {
        let results = vec![result("w1", "a", &["src/a.rs"], 3, 0), result("w2", "b", &["src/b.rs"], 3, 10)];
        let report = synthesize(&results, ConflictResolutionPolicy::PreferLaterCompleting);
        assert_eq!(report.file_ownership.len(), 2);
        assert!(report.unresolved_merges.is_empty());
    }
}
