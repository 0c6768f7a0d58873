// Load Hint Port
// How busy is the subsystem we share resources with?

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reports the current load of an unrelated subsystem
///
/// Queried synchronously on every dispatch; the result is subtracted from
/// the scheduler's concurrency budget. Must be cheap and must not block.
pub trait LoadHint: Send + Sync {
    /// Current load, in scheduler slots
    fn current_load(&self) -> usize;
}

/// Load hint for setups with no competing subsystem
pub struct NoLoad;

impl LoadHint for NoLoad {
    fn current_load(&self) -> usize {
        0
    }
}

/// Load counter owned by the competing subsystem
///
/// Clones share the same counter: the subsystem keeps one clone and bumps
/// it around its own work, the scheduler reads another.
#[derive(Debug, Clone, Default)]
pub struct SharedLoad {
    load: Arc<AtomicUsize>,
}

impl SharedLoad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, load: usize) {
        self.load.store(load, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.load.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        let _ = self
            .load
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |load| {
                Some(load.saturating_sub(1))
            });
    }
}

impl LoadHint for SharedLoad {
    fn current_load(&self) -> usize {
        self.load.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Mock LoadHint that also counts how often it was consulted
    #[derive(Default)]
    pub struct MockLoadHint {
        load: AtomicUsize,
        queries: AtomicUsize,
    }

    impl MockLoadHint {
        pub fn new(load: usize) -> Self {
            Self {
                load: AtomicUsize::new(load),
                queries: AtomicUsize::new(0),
            }
        }

        pub fn set_load(&self, load: usize) {
            self.load.store(load, Ordering::SeqCst);
        }

        pub fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    impl LoadHint for MockLoadHint {
        fn current_load(&self) -> usize {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.load.load(Ordering::SeqCst)
        }
    }
}
