//! Trace collector (O): structured, append-only JSONL of every LLM request,
//! tool call, thinking block, decision, and subagent spawn, with shared-file
//! semantics for subagent views (§4.5).

pub mod collector;
pub mod error;
pub mod hierarchy;
pub mod pricing;
pub mod writer;

pub use collector::{IterationAggregate, IterationHandle, TraceCollector};
pub use error::TraceError;
pub use hierarchy::{reconstruct_hierarchy, AgentNode, AgentTotals, HierarchyReport};
pub use pricing::{ModelPrice, PricingTable};
pub use writer::TraceWriter;
