// Scheduler constants (No magic values)
use std::time::Duration;

/// Ceiling on concurrently running jobs, regardless of core count
///
/// Most jobs are IO bound; more than this just thrashes the disk.
pub const HARD_CAP: usize = 3;

/// Slots always left free for the foreground subsystem
pub const FOREGROUND_HEADROOM: usize = 1;

/// Buffered scheduler events per subscriber before lagging ones drop events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Minimum time between two CPU samples taken by a CPU-backed load hint
pub const CPU_LOAD_REFRESH_INTERVAL: Duration = Duration::from_millis(500);
