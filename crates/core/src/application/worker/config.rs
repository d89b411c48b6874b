// Worker configuration

use super::constants::{ERROR_RECOVERY_SLEEP_DURATION, IDLE_SLEEP_DURATION};
use crate::domain::DEFAULT_QUEUE;
use std::time::Duration;

/// Per-worker settings, resolved once at startup
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue this worker claims from
    pub queue: String,
    /// Pause between polls while the queue is empty
    pub idle_sleep: Duration,
    /// Pause after a store error before polling again
    pub error_sleep: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            idle_sleep: IDLE_SLEEP_DURATION,
            error_sleep: ERROR_RECOVERY_SLEEP_DURATION,
        }
    }
}

impl WorkerConfig {
    pub fn for_queue(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Self::default()
        }
    }
}
