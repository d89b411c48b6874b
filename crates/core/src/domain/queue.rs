// Queue Domain Model

/// Queue used when a dispatch does not name one
pub const DEFAULT_QUEUE: &str = "default";

/// What happened to a job after a failed attempt was reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Job went back to the pending set and becomes available again at `available_at`
    Retrying { attempt: i32, available_at: i64 },
    /// Attempts are exhausted, job now lives in the dead set
    Dead { attempts: i32 },
}
