//! Units of background work
//!
//! A concrete job kind implements [`Job`]. The scheduler never sees the
//! concrete type: it wraps the body in a [`BackgroundJob`], which owns the
//! lifecycle record and the declared dependencies.
//!
//! The one contract every body must honour: consume the [`Completion`] it
//! receives in `execute`, exactly once, whether its work succeeded or not.

use crate::domain::{error::Result, JobId, JobInfo, JobRecord, JobState, Priority};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Job body implemented by each concrete job kind
pub trait Job: Send + 'static {
    /// Short human readable name ("Computing checksum")
    fn title(&self) -> String;

    /// What this particular instance works on (a file name, a URL...)
    fn details(&self) -> String {
        String::new()
    }

    /// Kick off the work and return promptly
    ///
    /// Slow or blocking work must be handed to another task or thread, which
    /// consumes `completion` when it is done. Failures are the job's own
    /// business: report them, then complete anyway.
    fn execute(&mut self, completion: Completion);
}

/// Single-use completion signal handed to [`Job::execute`]
///
/// Dropping it without calling [`Completion::complete`] still signals
/// completion (with a warning), so an early return or a panic inside the
/// job's helper cannot leak a scheduler slot.
#[must_use = "a job must consume its completion or the scheduler slot is only freed on drop"]
#[derive(Debug)]
pub struct Completion {
    job_id: JobId,
    tx: Option<mpsc::UnboundedSender<JobId>>,
}

impl Completion {
    pub(crate) fn new(job_id: JobId, tx: mpsc::UnboundedSender<JobId>) -> Self {
        Self {
            job_id,
            tx: Some(tx),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Signal that the job has finished
    pub fn complete(mut self) {
        self.signal();
    }

    fn signal(&mut self) {
        if let Some(tx) = self.tx.take() {
            // Scheduler gone means nobody is waiting for us anymore
            let _ = tx.send(self.job_id);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(
                job_id = %self.job_id,
                "Completion dropped without being signalled, completing job"
            );
            self.signal();
        }
    }
}

/// Cheap reference to a job, valid before and after submission
///
/// Used to declare dependencies on jobs that have already been handed to
/// the scheduler.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    priority: Priority,
    completed: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// True once the scheduler has observed this job's completion
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

impl PartialEq for JobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JobHandle {}

/// A job body plus its lifecycle record and dependencies
///
/// Dependencies can only be added while the caller still owns the job;
/// submitting moves it into the scheduler.
pub struct BackgroundJob {
    record: JobRecord,
    body: Box<dyn Job>,
    dependencies: Vec<JobHandle>,
    completed: Arc<AtomicBool>,
}

impl BackgroundJob {
    pub fn new(priority: Priority, body: impl Job) -> Self {
        Self {
            record: JobRecord::new(priority),
            body: Box::new(body),
            dependencies: Vec::new(),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> JobId {
        self.record.id()
    }

    pub fn priority(&self) -> Priority {
        self.record.priority()
    }

    pub fn state(&self) -> JobState {
        self.record.state()
    }

    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    pub fn title(&self) -> String {
        self.body.title()
    }

    pub fn details(&self) -> String {
        self.body.details()
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id(),
            priority: self.priority(),
            completed: Arc::clone(&self.completed),
        }
    }

    /// Hold this job back until `other` has completed
    ///
    /// Each call counts once, even for the same dependency twice.
    pub fn add_dependency(&mut self, other: &JobHandle) {
        self.dependencies.push(other.clone());
    }

    /// Number of declared dependencies
    pub fn pending_dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Declared dependencies that have not completed yet
    pub(crate) fn unresolved_dependencies(&self) -> impl Iterator<Item = &JobHandle> {
        self.dependencies.iter().filter(|dep| !dep.is_completed())
    }

    /// Mark running and hand control to the body
    ///
    /// A panicking body is contained here; its completion was dropped during
    /// the unwind, so the job still finishes through the normal path.
    pub(crate) fn start(&mut self, now_millis: i64, completion: Completion) -> Result<()> {
        self.record.start(now_millis)?;
        let body = &mut self.body;
        if let Err(panic_info) = catch_unwind(AssertUnwindSafe(|| body.execute(completion))) {
            let panic_msg = panic_message(panic_info.as_ref());
            error!(
                job_id = %self.record.id(),
                panic_msg = %panic_msg,
                "Job body panicked in execute"
            );
        }
        Ok(())
    }

    /// Freeze the record and publish completion to every handle
    pub(crate) fn finish(&mut self, now_millis: i64) -> Result<()> {
        self.record.stop(now_millis)?;
        self.completed.store(true, Ordering::Release);
        Ok(())
    }

    /// Snapshot for observers
    pub fn info(&self, now_millis: i64) -> JobInfo {
        JobInfo {
            id: self.id(),
            priority: self.priority(),
            title: self.title(),
            details: self.details(),
            state: self.state(),
            elapsed: self.record.elapsed(now_millis),
        }
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl std::fmt::Debug for BackgroundJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundJob")
            .field("record", &self.record)
            .field("title", &self.body.title())
            .field(
                "dependencies",
                &self.dependencies.iter().map(JobHandle::id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ProbeState {
        started: Vec<String>,
        completions: HashMap<String, Completion>,
    }

    /// Records which mock jobs started and holds their completions
    ///
    /// Tests decide when each job finishes by calling [`JobProbe::complete`].
    #[derive(Clone, Default)]
    pub struct JobProbe {
        state: Arc<Mutex<ProbeState>>,
    }

    impl JobProbe {
        pub fn new() -> Self {
            Self::default()
        }

        /// A job body reporting to this probe
        pub fn job(&self, name: impl Into<String>) -> ManualJob {
            ManualJob {
                name: name.into(),
                probe: self.clone(),
            }
        }

        /// Names in start order
        pub fn started(&self) -> Vec<String> {
            self.state.lock().unwrap().started.clone()
        }

        pub fn is_started(&self, name: &str) -> bool {
            self.state.lock().unwrap().started.iter().any(|n| n == name)
        }

        /// Started jobs whose completion has not been fired yet (sorted)
        pub fn running(&self) -> Vec<String> {
            let mut names: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .completions
                .keys()
                .cloned()
                .collect();
            names.sort();
            names
        }

        /// Fire the completion of `name`; false if it is not running
        pub fn complete(&self, name: &str) -> bool {
            let completion = self.state.lock().unwrap().completions.remove(name);
            match completion {
                Some(completion) => {
                    completion.complete();
                    true
                }
                None => false,
            }
        }

        /// Drop the completion of `name` without firing it
        pub fn abandon(&self, name: &str) -> bool {
            let completion = self.state.lock().unwrap().completions.remove(name);
            completion.is_some()
        }
    }

    /// Job that finishes only when the test says so
    pub struct ManualJob {
        name: String,
        probe: JobProbe,
    }

    impl Job for ManualJob {
        fn title(&self) -> String {
            self.name.clone()
        }

        fn details(&self) -> String {
            "manual test job".to_string()
        }

        fn execute(&mut self, completion: Completion) {
            let mut state = self.probe.state.lock().unwrap();
            state.started.push(self.name.clone());
            state.completions.insert(self.name.clone(), completion);
        }
    }

    /// Job that completes synchronously inside `execute`
    pub struct ImmediateJob {
        name: String,
    }

    impl ImmediateJob {
        pub fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    impl Job for ImmediateJob {
        fn title(&self) -> String {
            self.name.clone()
        }

        fn execute(&mut self, completion: Completion) {
            completion.complete();
        }
    }

    /// Job whose `execute` panics before touching its completion
    pub struct PanickyJob;

    impl Job for PanickyJob {
        fn title(&self) -> String {
            "panicky".to_string()
        }

        fn execute(&mut self, _completion: Completion) {
            panic!("job body blew up");
        }
    }
}
