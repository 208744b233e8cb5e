//! The kernel (K, §2): ties resilience (R), economics (B), the cache
//! tracker (C), the file-change journal (U), the trace collector (O) and
//! the tool registry together into one agent loop. Decomposition (T) and
//! swarm dispatch (S) build on top of a `Kernel` per worker rather than
//! living inside it; the plan lifecycle (P) gates which tool calls ever
//! reach `dispatch_tool_calls` and is driven by the caller, not by the
//! kernel itself.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod kernel;
pub mod session_store;

pub use cancellation::CancellationSource;
pub use config::{ConfigStore, KernelConfig};
pub use error::KernelError;
pub use event_bus::{EventBus, KernelEvent};
pub use kernel::{new_session_id, now_iso, record_policy_decision, IterationOutcome, Kernel, ToolExecutionRecord};
pub use session_store::SessionStore;
