//! Scheduler Service - end-to-end scenarios through SchedulerHandle
//!
//! Every scenario runs the real service task; jobs are driven by JobProbe
//! and progress is observed through broadcast events.

use pictor_core::application::job::mocks::{JobProbe, PanickyJob};
use pictor_core::application::{
    shutdown_channel, BackgroundJob, Scheduler, SchedulerEvent, SchedulerHandle, SchedulerService,
    ShutdownSender,
};
use pictor_core::domain::{JobId, JobInfo, JobState, Priority};
use pictor_core::port::time_provider::SystemTimeProvider;
use pictor_core::port::SharedLoad;
use pictor_core::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    handle: SchedulerHandle,
    events: broadcast::Receiver<SchedulerEvent>,
    load: SharedLoad,
    probe: JobProbe,
    shutdown: ShutdownSender,
    task: JoinHandle<pictor_core::Result<()>>,
}

impl Harness {
    /// 4 cores, so budget = 2 - load
    fn start(load: usize) -> Self {
        let shared = SharedLoad::new();
        shared.set(load);
        let scheduler =
            Scheduler::with_parallelism(Arc::new(shared.clone()), Arc::new(SystemTimeProvider), 4);
        let (service, handle) = SchedulerService::new(scheduler);
        let events = handle.subscribe();
        let (shutdown, token) = shutdown_channel();
        let task = tokio::spawn(service.run(token));

        Self {
            handle,
            events,
            load: shared,
            probe: JobProbe::new(),
            shutdown,
            task,
        }
    }

    async fn submit(&self, name: &str, priority: Priority) -> JobId {
        self.handle
            .submit(BackgroundJob::new(priority, self.probe.job(name)))
            .await
            .unwrap()
            .id()
    }

    /// Complete `name` and wait until the scheduler has processed it
    async fn finish(&mut self, name: &str) -> JobInfo {
        assert!(self.probe.complete(name), "{name} is not running");
        self.next_ended().await
    }

    async fn next_ended(&mut self) -> JobInfo {
        loop {
            let event = tokio::time::timeout(TIMEOUT, self.events.recv())
                .await
                .expect("timed out waiting for JobEnded")
                .expect("event channel closed");
            if let SchedulerEvent::JobEnded(info) = event {
                return info;
            }
        }
    }

    async fn stop(self) {
        self.shutdown.shutdown();
        tokio::time::timeout(TIMEOUT, self.task)
            .await
            .expect("service did not stop")
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn test_dispatch_follows_priority_then_fifo() {
    // budget 1
    let mut h = Harness::start(1);

    h.submit("blocker", Priority::ForegroundCycle).await;
    h.submit("A", Priority::BackgroundPreview).await;
    h.submit("B", Priority::ForegroundThumbnail).await;
    h.submit("C", Priority::BackgroundInfo).await;
    h.submit("C2", Priority::BackgroundInfo).await;
    assert_eq!(h.probe.running(), vec!["blocker"]);

    for name in ["blocker", "B", "C", "C2"] {
        h.finish(name).await;
    }
    assert_eq!(h.probe.started(), vec!["blocker", "B", "C", "C2", "A"]);

    h.stop().await;
}

#[tokio::test]
async fn test_running_never_exceeds_budget() {
    let mut h = Harness::start(1);

    for i in 0..5 {
        h.submit(&format!("job{i}"), Priority::BackgroundInfo).await;
    }

    for i in 0..5 {
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.budget, 1);
        assert_eq!(snapshot.running.len(), 1);
        assert_eq!(snapshot.pending.len(), 4 - i);
        h.finish(&format!("job{i}")).await;
    }

    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(snapshot.running.is_empty());
    assert!(snapshot.pending.is_empty());

    h.stop().await;
}

#[tokio::test]
async fn test_freed_slots_are_refilled_exactly() {
    // budget 2
    let mut h = Harness::start(0);

    for name in ["r1", "r2", "p1", "p2", "p3"] {
        h.submit(name, Priority::BackgroundThumbnail).await;
    }
    assert_eq!(h.probe.running(), vec!["r1", "r2"]);

    h.finish("r1").await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.running.len(), 2);
    assert_eq!(snapshot.pending.len(), 2);
    assert_eq!(h.probe.running(), vec!["p1", "r2"]);

    h.stop().await;
}

#[tokio::test]
async fn test_load_changes_apply_on_next_dispatch() {
    let mut h = Harness::start(0);

    for name in ["a", "b", "c", "d"] {
        h.submit(name, Priority::BackgroundInfo).await;
    }
    assert_eq!(h.probe.running(), vec!["a", "b"]);

    // Competing subsystem gets busy: freed slots are not refilled
    h.load.set(1);
    h.finish("a").await;
    assert_eq!(h.probe.running(), vec!["b"]);

    // Budget never drops below 1
    h.load.set(10);
    h.finish("b").await;
    assert_eq!(h.probe.running(), vec!["c"]);

    h.load.set(0);
    h.finish("c").await;
    assert_eq!(h.probe.running(), vec!["d"]);

    h.stop().await;
}

#[tokio::test]
async fn test_dependent_waits_for_lower_priority_dependency() {
    let mut h = Harness::start(0);

    let k = h
        .handle
        .submit(BackgroundJob::new(
            Priority::BackgroundPreview,
            h.probe.job("K"),
        ))
        .await
        .unwrap();

    let mut j = BackgroundJob::new(Priority::ForegroundCycle, h.probe.job("J"));
    j.add_dependency(&k);
    let j = h.handle.submit(j).await.unwrap();

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.blocked, 1);
    assert!(!h.probe.is_started("J"));

    let ended = h.finish("K").await;
    assert_eq!(ended.id, k.id());
    assert!(k.is_completed());

    assert_eq!(h.probe.started(), vec!["K", "J"]);
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.blocked, 0);
    assert_eq!(snapshot.running.len(), 1);
    assert_eq!(snapshot.running[0].id, j.id());

    h.stop().await;
}

#[tokio::test]
async fn test_dependency_cycle_is_rejected() {
    let h = Harness::start(0);

    let mut a = BackgroundJob::new(Priority::BackgroundInfo, h.probe.job("a"));
    let mut b = BackgroundJob::new(Priority::BackgroundInfo, h.probe.job("b"));
    let a_handle = a.handle();
    a.add_dependency(&b.handle());
    b.add_dependency(&a_handle);

    h.handle.submit(a).await.unwrap();
    let err = h.handle.submit(b).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(_)), "got {err:?}");
    assert!(h.probe.started().is_empty());

    h.stop().await;
}

#[tokio::test]
async fn test_pause_holds_background_but_not_foreground() {
    let mut h = Harness::start(0);

    assert!(h.handle.set_paused(true).await.unwrap());
    h.submit("background", Priority::BackgroundPreview).await;
    assert!(h.probe.started().is_empty());

    h.submit("foreground", Priority::ForegroundThumbnail).await;
    assert_eq!(h.probe.started(), vec!["foreground"]);

    // Budget allows two, but the background job stays paused
    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(snapshot.paused);
    assert_eq!(snapshot.running.len(), 1);
    assert_eq!(snapshot.pending.len(), 1);

    h.finish("foreground").await;
    assert!(!h.probe.is_started("background"));

    assert!(!h.handle.toggle_pause().await.unwrap());
    assert_eq!(h.probe.started(), vec!["foreground", "background"]);

    h.stop().await;
}

#[tokio::test]
async fn test_lifecycle_is_reported_in_order() {
    let mut h = Harness::start(0);

    let id = h.submit("job", Priority::BackgroundInfo).await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.running[0].state, JobState::Running);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.probe.complete("job"));

    let mut observed = Vec::new();
    loop {
        let event = tokio::time::timeout(TIMEOUT, h.events.recv())
            .await
            .unwrap()
            .unwrap();
        let done = event == SchedulerEvent::Idle;
        observed.push(event);
        if done {
            break;
        }
    }

    assert_eq!(observed[0], SchedulerEvent::Busy);
    match &observed[1] {
        SchedulerEvent::JobStarted(info) => {
            assert_eq!(info.id, id);
            assert_eq!(info.state, JobState::Running);
        }
        other => panic!("expected JobStarted, got {other:?}"),
    }
    match &observed[2] {
        SchedulerEvent::JobEnded(info) => {
            assert_eq!(info.id, id);
            assert_eq!(info.state, JobState::Completed);
            assert!(info.elapsed.unwrap() >= Duration::from_millis(20));
        }
        other => panic!("expected JobEnded, got {other:?}"),
    }
    assert_eq!(observed.len(), 4);

    h.stop().await;
}

#[tokio::test]
async fn test_abandoned_completion_frees_the_slot() {
    let mut h = Harness::start(1);

    h.submit("lost", Priority::BackgroundInfo).await;
    h.submit("next", Priority::BackgroundInfo).await;

    assert!(h.probe.abandon("lost"));
    let ended = h.next_ended().await;
    assert_eq!(ended.state, JobState::Completed);
    assert_eq!(h.probe.running(), vec!["next"]);

    h.stop().await;
}

#[tokio::test]
async fn test_panicking_job_keeps_service_alive() {
    let mut h = Harness::start(1);

    let panicky = h
        .handle
        .submit(BackgroundJob::new(Priority::BackgroundInfo, PanickyJob))
        .await
        .unwrap();
    let ended = h.next_ended().await;
    assert_eq!(ended.id, panicky.id());
    assert!(panicky.is_completed());

    h.submit("next", Priority::ForegroundCycle).await;
    assert_eq!(h.probe.running(), vec!["next"]);

    h.stop().await;
}
