// CPU-backed load hint
// reason: sysinfo for cross-platform CPU sampling
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use sysinfo::System;
use tracing::debug;

use pictor_core::application::constants::{CPU_LOAD_REFRESH_INTERVAL, HARD_CAP};
use pictor_core::port::LoadHint;

/// Load hint derived from global CPU usage
///
/// Maps usage onto the scheduler's slot scale: at 100% CPU the hint reports
/// every slot the scheduler could use as busy. Samples are cached for
/// `CPU_LOAD_REFRESH_INTERVAL` so dispatching stays cheap.
pub struct CpuLoadHint {
    slots: usize,
    state: Mutex<SampleState>,
}

struct SampleState {
    system: System,
    sampled_at: Option<Instant>,
    load: usize,
}

impl CpuLoadHint {
    /// Create a new CPU load hint
    ///
    /// # Example
    /// ```ignore
    /// let hint = Arc::new(CpuLoadHint::new());
    /// let scheduler = Scheduler::new(hint, Arc::new(SystemTimeProvider));
    /// ```
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        let cores = system.cpus().len().max(1);
        Self {
            slots: HARD_CAP.min(cores),
            state: Mutex::new(SampleState {
                system,
                sampled_at: None,
                load: 0,
            }),
        }
    }
}

impl Default for CpuLoadHint {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadHint for CpuLoadHint {
    fn current_load(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        let fresh = state
            .sampled_at
            .is_some_and(|at| now.duration_since(at) < CPU_LOAD_REFRESH_INTERVAL);
        if fresh {
            return state.load;
        }

        state.system.refresh_cpu();
        let cpu_usage_percent = state.system.global_cpu_info().cpu_usage();
        state.load = usage_to_slots(cpu_usage_percent, self.slots);
        state.sampled_at = Some(now);

        debug!(
            cpu = %cpu_usage_percent,
            load = state.load,
            "CPU load sampled"
        );
        state.load
    }
}

/// Scale a CPU percentage onto `slots` scheduler slots
fn usage_to_slots(cpu_usage_percent: f32, slots: usize) -> usize {
    let fraction = cpu_usage_percent.clamp(0.0, 100.0) / 100.0;
    (fraction * slots as f32).round() as usize
}
