// Application Layer - Scheduling logic and its event loop

pub mod constants;
pub mod events;
pub mod job;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod shutdown;

// Re-exports
pub use events::SchedulerEvent;
pub use job::{BackgroundJob, Completion, Job, JobHandle};
pub use queue::PriorityQueue;
pub use scheduler::{Scheduler, SchedulerSnapshot};
pub use service::{SchedulerHandle, SchedulerService};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
