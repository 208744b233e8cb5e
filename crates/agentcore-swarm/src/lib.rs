//! Swarm scheduler (S): consumes a dependency DAG's parallel waves,
//! maintains a worker pool with per-worker rate limiting and its own
//! economics instance, and aggregates typed results with configurable
//! conflict resolution.

pub mod budget_pool;
pub mod dispatch;
pub mod error;
pub mod ratelimit;
pub mod result;
pub mod worker;

pub use budget_pool::{BudgetPoolConfig, Priority, SharedBudgetPool};
pub use dispatch::SwarmScheduler;
pub use error::SwarmError;
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use result::{synthesize, ConflictResolutionPolicy, FileOwnership, SwarmTaskResult, SynthesisReport, UnresolvedMerge};
pub use worker::{WorkerSpec, WorkerState};
