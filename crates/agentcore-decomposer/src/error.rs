use agentcore_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecomposerError {
    #[error("could not parse any subtasks from LLM output")]
    ParseError,
    #[error("decomposition invalid: {0}")]
    Invalid(String),
}

impl DecomposerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecomposerError::ParseError | DecomposerError::Invalid(_) => ErrorKind::Input,
        }
    }
}
