use agentcore_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("worker pool is empty")]
    EmptyPool,
    #[error("budget pool would under-provision child {child_id} below the starvation floor")]
    StarvationDeferred { child_id: String },
    #[error("no worker with id {0} is registered")]
    UnknownWorker(String),
}

impl SwarmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwarmError::EmptyPool => ErrorKind::Internal,
            SwarmError::StarvationDeferred { .. } => ErrorKind::Policy,
            SwarmError::UnknownWorker(_) => ErrorKind::Input,
        }
    }
}
