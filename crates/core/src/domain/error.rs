// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error("Unknown job state: {0}")]
    UnknownJobState(String),

    #[error("Job {job_id} exhausted its retries after {attempts} attempts")]
    ExhaustedRetries { job_id: String, attempts: i32 },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
