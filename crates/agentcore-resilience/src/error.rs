use agentcore_types::ErrorKind;
use thiserror::Error;

/// Errors surfaced by `execute(fn)` (§4.1 contract).
#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("circuit open for provider `{provider_id}`")]
    CircuitOpen { provider_id: String },

    #[error("fallback chain exhausted after trying {attempted} provider(s): {last_error}")]
    ChainExhausted { attempted: usize, last_error: String },

    #[error("retry budget exhausted after {attempts} attempt(s): {last_error}")]
    RetryBudgetExhausted { attempts: u32, last_error: String },

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Underlying(#[from] anyhow::Error),
}

impl ResilienceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::CircuitOpen { .. }
            | ResilienceError::ChainExhausted { .. }
            | ResilienceError::RetryBudgetExhausted { .. }
            | ResilienceError::Cancelled(_) => ErrorKind::Policy,
            ResilienceError::Timeout(_) => ErrorKind::Transient,
            ResilienceError::Underlying(_) => ErrorKind::Transient,
        }
    }
}
