// Domain Error Types

use super::job::JobId;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Dependency cycle: job {job} transitively waits on itself via job {via}")]
    DependencyCycle { job: JobId, via: JobId },
}

pub type Result<T> = std::result::Result<T, DomainError>;
