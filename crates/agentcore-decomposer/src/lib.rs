//! Task decomposer & dependency engine (T): turns messy LLM output into a
//! validated DAG of subtasks with parallel waves, conflict detection, and a
//! heuristic fallback when the LLM loop comes up empty.

pub mod conflict;
pub mod decomposer;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod parser;
pub mod resolve;
pub mod strategy;
pub mod validate;

pub use conflict::{detect_conflicts, ConflictKind, FileConflict};
pub use decomposer::{decompose, decompose_with_llm_loop, heuristic_decompose, DecompositionResult};
pub use error::DecomposerError;
pub use graph::build_graph;
pub use normalize::{normalize_all, normalize_subtask};
pub use parser::{parse_decomposition_response, ParseResult};
pub use resolve::resolve_dependencies;
pub use strategy::{select_strategy, Strategy};
pub use validate::{validate, warnings};
