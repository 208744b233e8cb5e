use serde::{Deserialize, Serialize};

/// The §7 error taxonomy. Every crate's public error enum implements a
/// `kind() -> ErrorKind` method so the kernel can apply one propagation
/// policy across components instead of matching on each crate's variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retry-eligible: network, 5xx, timeout, rate-limited.
    Transient,
    /// Not retry-eligible: circuit-open, chain-exhausted, budget-exhausted,
    /// cancellation, permission-denied.
    Policy,
    /// User-visible: malformed LLM output, invalid tool args, dependency cycles.
    Input,
    /// Surface and halt the current operation: journal write failure,
    /// checkpoint snapshot failure.
    Durability,
    /// A bug: invariant violation. Log and fail the session.
    Internal,
}

impl ErrorKind {
    /// Whether a component wrapping a call with retry logic should retry
    /// an error of this kind.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}
