use agentcore_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to open trace file {path}: {source}")]
    Open { path: String, #[source] source: std::io::Error },
    #[error("write queue closed")]
    QueueClosed,
    #[error("unknown pending request id: {0}")]
    UnknownPending(String),
}

impl TraceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraceError::Open { .. } => ErrorKind::Durability,
            TraceError::QueueClosed => ErrorKind::Internal,
            TraceError::UnknownPending(_) => ErrorKind::Input,
        }
    }
}
