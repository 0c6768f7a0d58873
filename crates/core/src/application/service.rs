//! Scheduler Service - single task owning all scheduler state
//!
//! The `Scheduler` is a plain `&mut self` state machine. This service gives
//! it an event loop: one tokio task owns it and reacts to three inputs,
//! in whatever order they arrive:
//! - completion signals from running jobs
//! - commands from `SchedulerHandle`s (submit, pause, snapshot)
//! - the shutdown token
//!
//! Nothing else can touch the scheduler, so no locks are needed.

use crate::application::events::SchedulerEvent;
use crate::application::job::{BackgroundJob, JobHandle};
use crate::application::scheduler::{Scheduler, SchedulerSnapshot};
use crate::application::shutdown::ShutdownToken;
use crate::error::{AppError, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{error, info, warn};

enum Command {
    Submit {
        job: BackgroundJob,
        reply: Option<oneshot::Sender<Result<JobHandle>>>,
    },
    /// `None` toggles
    SetPaused {
        paused: Option<bool>,
        reply: oneshot::Sender<Result<bool>>,
    },
    Snapshot {
        reply: oneshot::Sender<SchedulerSnapshot>,
    },
}

/// Cloneable access point to a running `SchedulerService`
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl SchedulerHandle {
    /// Submit a job and wait until the scheduler has accepted it
    pub async fn submit(&self, job: BackgroundJob) -> Result<JobHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit {
            job,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| AppError::SchedulerStopped)?
    }

    /// Submit without waiting (usable from inside `Job::execute`)
    ///
    /// Rejections (e.g. dependency cycles) are logged by the service.
    pub fn enqueue(&self, job: BackgroundJob) -> Result<JobHandle> {
        let handle = job.handle();
        self.send(Command::Submit { job, reply: None })?;
        Ok(handle)
    }

    /// Flip the pause flag; returns the new value
    pub async fn toggle_pause(&self) -> Result<bool> {
        self.request_pause(None).await
    }

    pub async fn set_paused(&self, paused: bool) -> Result<bool> {
        self.request_pause(Some(paused)).await
    }

    pub async fn snapshot(&self) -> Result<SchedulerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| AppError::SchedulerStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    async fn request_pause(&self, paused: Option<bool>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetPaused { paused, reply })?;
        rx.await.map_err(|_| AppError::SchedulerStopped)?
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| AppError::SchedulerStopped)
    }
}

/// Event loop around a `Scheduler`
pub struct SchedulerService {
    scheduler: Scheduler,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl SchedulerService {
    pub fn new(scheduler: Scheduler) -> (Self, SchedulerHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let handle = SchedulerHandle {
            commands: tx,
            events: scheduler.event_sender(),
        };
        (
            Self {
                scheduler,
                commands,
            },
            handle,
        )
    }

    /// Run until shutdown is requested or every handle is dropped
    ///
    /// Jobs still running or pending at that point are abandoned.
    pub async fn run(self, mut shutdown: ShutdownToken) -> Result<()> {
        let Self {
            mut scheduler,
            mut commands,
        } = self;
        info!("Scheduler service started");

        loop {
            if shutdown.is_shutdown() {
                info!("Scheduler service shutting down");
                break;
            }
            tokio::select! {
                Some(job_id) = scheduler.next_completion() => {
                    if let Err(e) = scheduler.handle_completion(job_id) {
                        error!(job_id = %job_id, error = %e, "Failed to finish job");
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => Self::handle_command(&mut scheduler, command),
                    None => {
                        info!("All scheduler handles dropped");
                        break;
                    }
                },
                _ = shutdown.wait() => {
                    info!("Scheduler service interrupted");
                    break;
                }
            }
        }

        let snapshot = scheduler.snapshot();
        if !snapshot.running.is_empty() || !snapshot.pending.is_empty() || snapshot.blocked > 0 {
            warn!(
                running = snapshot.running.len(),
                pending = snapshot.pending.len(),
                blocked = snapshot.blocked,
                "Scheduler stopped with unfinished jobs"
            );
        }
        info!("Scheduler service stopped");
        Ok(())
    }

    fn handle_command(scheduler: &mut Scheduler, command: Command) {
        match command {
            Command::Submit { job, reply } => {
                let job_id = job.id();
                let result = scheduler.submit(job);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            error!(job_id = %job_id, error = %e, "Job rejected");
                        }
                    }
                }
            }
            Command::SetPaused { paused, reply } => {
                let result = match paused {
                    Some(paused) => scheduler.set_paused(paused).map(|_| paused),
                    None => scheduler.toggle_pause(),
                };
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(scheduler.snapshot());
            }
        }
    }
}
