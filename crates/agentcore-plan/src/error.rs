use agentcore_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("pending plan {0} is already terminal and cannot accept new changes")]
    AlreadyTerminal(String),
    #[error("step number {0} does not exist in this plan")]
    NoSuchStep(u32),
    #[error("step {0} has unmet dependencies and cannot run yet")]
    DependenciesUnmet(u32),
    #[error("checkpoint {0} was not found")]
    NoSuchCheckpoint(String),
    #[error("could not parse a plan edit command: {0:?}")]
    UnparsableEdit(String),
    #[error("plan draft could not be parsed into any steps")]
    UnparsableDraft,
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::AlreadyTerminal(_) | PlanError::DependenciesUnmet(_) => ErrorKind::Policy,
            PlanError::NoSuchStep(_) | PlanError::NoSuchCheckpoint(_) | PlanError::UnparsableEdit(_) | PlanError::UnparsableDraft => ErrorKind::Input,
        }
    }
}
