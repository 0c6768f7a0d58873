// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scheduler service is no longer running")]
    SchedulerStopped,
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
