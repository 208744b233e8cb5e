use agentcore_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EconomicsError {
    #[error("budget exhausted: {budget_type:?} at {used}/{limit}")]
    BudgetExhausted { budget_type: agentcore_types::BudgetType, used: f64, limit: f64 },

    #[error("invalid budget configuration: {0}")]
    InvalidConfig(String),
}

impl EconomicsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EconomicsError::BudgetExhausted { .. } => ErrorKind::Policy,
            EconomicsError::InvalidConfig(_) => ErrorKind::Input,
        }
    }
}
