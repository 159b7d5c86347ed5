//! Error types for the scheduler

use thiserror::Error;

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors returned by the scheduler's public operations
///
/// Failures talking to the remote worker never show up here: they are
/// logged by the status poller and only affect the job's final status.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A job with the same id is already queued or running
    #[error("job {0} is already queued or running")]
    AlreadyScheduled(String),
}
