// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default lease on a dequeued job before it may be redelivered (5 minutes)
pub const DEFAULT_LEASE_MS: i64 = 5 * 60 * 1000;

/// Default interval between expired-lease sweeps (30s)
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Progress milestones reported by handlers (percent)
pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_CHECKED: u8 = 30;
pub const PROGRESS_DISPATCHED: u8 = 60;
pub const PROGRESS_CONFIRMED: u8 = 90;
pub const PROGRESS_DONE: u8 = 100;
