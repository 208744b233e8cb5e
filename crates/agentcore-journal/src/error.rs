use agentcore_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed diff: {0}")]
    MalformedDiff(String),

    #[error("change `{0}` already undone")]
    AlreadyUndone(String),

    #[error("change `{0}` not found")]
    NotFound(String),
}

impl JournalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JournalError::Database(_) | JournalError::Io(_) => ErrorKind::Durability,
            JournalError::MalformedDiff(_) => ErrorKind::Input,
            JournalError::AlreadyUndone(_) | JournalError::NotFound(_) => ErrorKind::Policy,
        }
    }
}
