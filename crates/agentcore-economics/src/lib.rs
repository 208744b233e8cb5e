//! Economics core (B): incremental token/cost/iteration accounting, budget
//! verdicts, doom-loop detection and phase-stall tracking (§4.2).

pub mod accounting;
pub mod doomloop;
pub mod error;
pub mod phase;

pub use accounting::{BudgetConfig, Economics, LlmUsageDelta, SOFT_LIMIT_ESCALATION_RATIO};
pub use doomloop::{DoomLoopConfig, DoomLoopDetector, DoomLoopKind, DoomLoopReport, ToolCallObservation};
pub use error::EconomicsError;
pub use phase::{Phase, PhaseStallReport, PhaseTracker, PhaseTrackerConfig};
