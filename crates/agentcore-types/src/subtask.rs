use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Closed, normalized subtask category. LLM output arrives as arbitrary strings;
/// `SubtaskType::normalize` folds every known alias and unrecognized input onto
/// this enum so downstream code never matches on raw strings again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskType {
    Research,
    Analysis,
    Design,
    Implement,
    Test,
    Refactor,
    Review,
    Document,
    Integrate,
    Deploy,
    Merge,
}

impl SubtaskType {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "research" => Self::Research,
            "analysis" | "analyze" => Self::Analysis,
            "design" => Self::Design,
            "implement" | "implementation" | "build" | "code" => Self::Implement,
            "test" | "testing" => Self::Test,
            "refactor" | "refactoring" => Self::Refactor,
            "review" => Self::Review,
            "document" | "documentation" | "docs" => Self::Document,
            "integrate" | "integration" => Self::Integrate,
            "deploy" | "deployment" => Self::Deploy,
            "merge" => Self::Merge,
            _ => Self::Implement,
        }
    }

    /// Whether this task type receives `modifies` (write access) by default when
    /// the decomposer has `relevantFiles` but no explicit `modifies` set.
    pub fn writes_relevant_files(self) -> bool {
        matches!(
            self,
            Self::Implement | Self::Refactor | Self::Test | Self::Document
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Blocked,
}

/// A single unit of work produced by the decomposer (T).
///
/// Invariant: `dependencies` never contains `id` itself, and every entry must
/// name another subtask in the same decomposition (enforced by `DependencyGraph`
/// construction, not by this type alone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: SubtaskType,
    pub complexity: u8,
    pub dependencies: Vec<String>,
    pub parallelizable: bool,
    pub status: SubtaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reads: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifies: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_files: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_role: Option<String>,
}

impl Subtask {
    pub fn new(id: impl Into<String>, description: impl Into<String>, task_type: SubtaskType) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            task_type,
            complexity: 3,
            dependencies: Vec::new(),
            parallelizable: true,
            status: SubtaskStatus::Pending,
            reads: None,
            modifies: None,
            relevant_files: None,
            suggested_role: None,
        }
    }

    /// Non-whitespace character count, used by the validator's granularity check.
    pub fn description_len(&self) -> usize {
        self.description.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Resolved dependency graph over a set of subtasks: adjacency maps, topological
/// order, parallel waves, and any cycles found during construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub dependencies: std::collections::BTreeMap<String, Vec<String>>,
    pub dependents: std::collections::BTreeMap<String, Vec<String>>,
    pub execution_order: Vec<String>,
    pub parallel_groups: Vec<Vec<String>>,
    pub cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn is_valid(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn wave_of(&self, id: &str) -> Option<usize> {
        self.parallel_groups.iter().position(|wave| wave.iter().any(|m| m == id))
    }
}
