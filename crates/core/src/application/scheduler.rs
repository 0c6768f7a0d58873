//! Scheduler - the job dispatcher
//!
//! Owns every submitted job until its completion is observed:
//! - blocked: waiting for dependencies, invisible to the queue
//! - pending: queued by priority
//! - running: started, waiting for their completion signal
//!
//! Every state change (submit, completion, pause toggle) ends in `dispatch`,
//! which starts as many pending jobs as the concurrency budget and the pause
//! policy allow. All methods take `&mut self` and never block: the scheduler
//! is meant to live on a single task (see `SchedulerService`).

use crate::application::constants::{EVENT_CHANNEL_CAPACITY, FOREGROUND_HEADROOM, HARD_CAP};
use crate::application::events::SchedulerEvent;
use crate::application::job::{BackgroundJob, Completion, JobHandle};
use crate::application::queue::PriorityQueue;
use crate::domain::{DomainError, JobId, JobInfo, BACKGROUND_BOUNDARY};
use crate::error::{AppError, Result};
use crate::port::{LoadHint, TimeProvider};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Job held back until its dependencies complete
struct BlockedJob {
    job: BackgroundJob,
    remaining: usize,
}

/// Read-only view of the scheduler for presentation
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub running: Vec<JobInfo>,
    pub pending: Vec<JobInfo>,
    pub blocked: usize,
    pub paused: bool,
    pub budget: usize,
}

/// Priority dispatcher with dependency resolution and pause support
pub struct Scheduler {
    pending: PriorityQueue<BackgroundJob>,
    running: Vec<BackgroundJob>,
    blocked: HashMap<JobId, BlockedJob>,
    dependents: HashMap<JobId, Vec<JobId>>,
    paused: bool,
    busy: bool,
    parallelism: usize,
    load_hint: Arc<dyn LoadHint>,
    time_provider: Arc<dyn TimeProvider>,
    completion_tx: mpsc::UnboundedSender<JobId>,
    completion_rx: mpsc::UnboundedReceiver<JobId>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a scheduler sized for this machine
    pub fn new(load_hint: Arc<dyn LoadHint>, time_provider: Arc<dyn TimeProvider>) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_parallelism(load_hint, time_provider, parallelism)
    }

    /// Create a scheduler with an explicit core count
    pub fn with_parallelism(
        load_hint: Arc<dyn LoadHint>,
        time_provider: Arc<dyn TimeProvider>,
        parallelism: usize,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pending: PriorityQueue::new(),
            running: Vec::new(),
            blocked: HashMap::new(),
            dependents: HashMap::new(),
            paused: false,
            busy: false,
            parallelism: parallelism.max(1),
            load_hint,
            time_provider,
            completion_tx,
            completion_rx,
            events,
        }
    }

    /// Hand a job to the scheduler
    ///
    /// Jobs with unfinished dependencies are held back and enter the queue
    /// once the last one completes. Fails fast if the dependencies would
    /// form a cycle through jobs already held back.
    pub fn submit(&mut self, job: BackgroundJob) -> Result<JobHandle> {
        let handle = job.handle();
        let unresolved: Vec<JobId> = job.unresolved_dependencies().map(JobHandle::id).collect();

        if unresolved.is_empty() {
            debug!(
                job_id = %job.id(),
                priority = %job.priority(),
                title = %job.title(),
                "Job queued"
            );
            let priority = job.priority();
            self.pending.enqueue(job, priority);
            self.dispatch()?;
            return Ok(handle);
        }

        self.check_for_cycle(job.id(), &unresolved)?;

        for dependency in &unresolved {
            self.dependents
                .entry(*dependency)
                .or_default()
                .push(job.id());
        }
        info!(
            job_id = %job.id(),
            waiting_on = ?unresolved,
            "Job blocked on dependencies"
        );
        self.blocked.insert(
            job.id(),
            BlockedJob {
                remaining: unresolved.len(),
                job,
            },
        );
        Ok(handle)
    }

    /// Flip the pause flag and return the new value
    pub fn toggle_pause(&mut self) -> Result<bool> {
        self.set_paused(!self.paused)?;
        Ok(self.paused)
    }

    /// Set the pause flag; unpausing resumes background work immediately
    pub fn set_paused(&mut self, paused: bool) -> Result<()> {
        if self.paused != paused {
            self.paused = paused;
            info!(paused = paused, "Background jobs pause toggled");
            let _ = self.events.send(SchedulerEvent::PauseChanged { paused });
        }
        self.dispatch()
    }

    /// How many jobs may run right now
    ///
    /// `max(1, min(HARD_CAP, cores) - load - 1)`: one slot stays free for the
    /// foreground subsystem, yet at least one job always makes progress.
    pub fn concurrency_budget(&self) -> usize {
        HARD_CAP
            .min(self.parallelism)
            .saturating_sub(self.load_hint.current_load())
            .saturating_sub(FOREGROUND_HEADROOM)
            .max(1)
    }

    /// Paused and no foreground job waiting to bypass the pause
    pub fn is_effectively_paused(&self) -> bool {
        self.paused && !self.pending.has_jobs_above(BACKGROUND_BOUNDARY)
    }

    /// Finish the running job `job_id` and dispatch more work
    pub fn handle_completion(&mut self, job_id: JobId) -> Result<()> {
        let position = self
            .running
            .iter()
            .position(|job| job.id() == job_id)
            .ok_or_else(|| AppError::NotFound(format!("running job {}", job_id)))?;

        let mut job = self.running.remove(position);
        let now = self.time_provider.now_millis();
        job.finish(now)?;

        let info = job.info(now);
        info!(
            job_id = %job_id,
            title = %info.title,
            elapsed_ms = info.elapsed.map(|e| e.as_millis()).unwrap_or_default(),
            "Job completed"
        );
        let _ = self.events.send(SchedulerEvent::JobEnded(info));
        drop(job);

        self.release_dependents(job_id);
        self.dispatch()
    }

    /// Handle every completion signalled so far; returns how many
    pub fn process_completions(&mut self) -> Result<usize> {
        let mut processed = 0;
        while let Ok(job_id) = self.completion_rx.try_recv() {
            self.handle_completion(job_id)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Wait for the next completion signal
    pub async fn next_completion(&mut self) -> Option<JobId> {
        self.completion_rx.recv().await
    }

    /// Subscribe to scheduler events
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SchedulerEvent> {
        self.events.clone()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn running_at(&self, index: usize) -> Option<JobInfo> {
        let now = self.time_provider.now_millis();
        self.running.get(index).map(|job| job.info(now))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_at(&self, index: usize) -> Option<JobInfo> {
        let now = self.time_provider.now_millis();
        self.pending.peek(index).map(|job| job.info(now))
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_running_jobs(&self) -> bool {
        !self.running.is_empty()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let now = self.time_provider.now_millis();
        SchedulerSnapshot {
            running: self.running.iter().map(|job| job.info(now)).collect(),
            pending: self.pending.iter().map(|job| job.info(now)).collect(),
            blocked: self.blocked.len(),
            paused: self.paused,
            budget: self.concurrency_budget(),
        }
    }

    /// Start pending jobs while budget and pause policy allow
    fn dispatch(&mut self) -> Result<()> {
        self.update_activity();
        if self.pending.is_empty() {
            return Ok(());
        }

        let budget = self.concurrency_budget();
        while self.running.len() < budget {
            // Re-checked per job: a foreground job may be followed by background ones
            if self.is_effectively_paused() {
                debug!(
                    pending = self.pending.len(),
                    "Paused, holding background jobs"
                );
                break;
            }
            let Some(mut job) = self.pending.dequeue() else {
                break;
            };

            let now = self.time_provider.now_millis();
            let completion = Completion::new(job.id(), self.completion_tx.clone());
            job.start(now, completion)?;

            info!(
                job_id = %job.id(),
                priority = %job.priority(),
                title = %job.title(),
                running = self.running.len() + 1,
                budget = budget,
                "Job started"
            );
            let _ = self.events.send(SchedulerEvent::JobStarted(job.info(now)));
            self.running.push(job);
        }
        Ok(())
    }

    /// Move dependents of `job_id` whose counter reaches zero into the queue
    fn release_dependents(&mut self, job_id: JobId) {
        let Some(waiting) = self.dependents.remove(&job_id) else {
            return;
        };

        for dependent in waiting {
            let ready = match self.blocked.get_mut(&dependent) {
                Some(blocked) => {
                    blocked.remaining = blocked.remaining.saturating_sub(1);
                    blocked.remaining == 0
                }
                None => false,
            };
            if !ready {
                continue;
            }
            if let Some(blocked) = self.blocked.remove(&dependent) {
                debug!(
                    job_id = %dependent,
                    released_by = %job_id,
                    "Dependencies resolved, job queued"
                );
                let priority = blocked.job.priority();
                self.pending.enqueue(blocked.job, priority);
            }
        }
    }

    /// Reject `job_id` if any held-back job it waits on waits on it in turn
    fn check_for_cycle(
        &self,
        job_id: JobId,
        dependencies: &[JobId],
    ) -> std::result::Result<(), DomainError> {
        let mut stack: Vec<(JobId, JobId)> = dependencies.iter().map(|&id| (id, id)).collect();
        let mut seen = HashSet::new();

        while let Some((current, via)) = stack.pop() {
            if current == job_id {
                return Err(DomainError::DependencyCycle { job: job_id, via });
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(blocked) = self.blocked.get(&current) {
                stack.extend(
                    blocked
                        .job
                        .unresolved_dependencies()
                        .map(|dep| (dep.id(), via)),
                );
            }
        }
        Ok(())
    }

    fn update_activity(&mut self) {
        let busy = !self.pending.is_empty() || !self.running.is_empty();
        if busy == self.busy {
            return;
        }
        self.busy = busy;
        if busy {
            debug!("Scheduler busy");
            let _ = self.events.send(SchedulerEvent::Busy);
        } else {
            debug!("Scheduler idle");
            let _ = self.events.send(SchedulerEvent::Idle);
        }
    }
}
