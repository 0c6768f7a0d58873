// Domain Layer - Pure scheduling entities

pub mod error;
pub mod job;
pub mod priority;

// Re-exports
pub use error::DomainError;
pub use job::{JobId, JobInfo, JobRecord, JobState};
pub use priority::{Priority, BACKGROUND_BOUNDARY};
