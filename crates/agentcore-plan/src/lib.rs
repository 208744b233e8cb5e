//! Plan lifecycle (P, §4.8): two related but independent flows share this
//! crate because both gate tool execution on explicit human sign-off.
//!
//! - [`pending`] — the pending-plan queue used in "plan mode": writes are
//!   intercepted and queued as [`agentcore_types::ProposedChange`]s instead
//!   of executed, then approved/rejected/cleared in bulk.
//! - [`draft`] + [`edit`] + [`execution`] — the interactive plan: a single
//!   LLM draft call produces ordered steps, natural-language edits mutate
//!   them before approval, and [`execution::PlanExecutor`] drives approved
//!   steps one at a time with auto-checkpointing and decision-point pauses.

pub mod draft;
pub mod edit;
pub mod error;
pub mod execution;
pub mod pending;

pub use draft::parse_draft;
pub use edit::{apply_edit, parse_edit_command, EditCommand, ParsedEdit, CONFIDENCE_THRESHOLD};
pub use error::PlanError;
pub use execution::{ExecutionConfig, PlanExecutor, StepOutcome};
pub use pending::{approve, clear, propose_change, reject};
