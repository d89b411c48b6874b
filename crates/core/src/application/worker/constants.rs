// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Default exponential backoff factor between attempts
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Default attempts per job before it lands in the dead set
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Upper bound accepted for max_attempts at dispatch
pub const MAX_ATTEMPTS_LIMIT: i32 = 100;

/// Default number of concurrent workers per process
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default recovery window for orphaned jobs (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Marker file written after every processed job
pub const CONTEXT_MARKER_PATH: &str = "jobprocessed_context";
