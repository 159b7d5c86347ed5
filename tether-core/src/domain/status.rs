//! Remote status observations
//!
//! A remote worker answers a status query with one of the six job status
//! names, or with the `"Unknown"` sentinel when it has no record of the job.
//! An unknown answer is ambiguous: the job may not have arrived yet, or it
//! may already have been retired.

use crate::domain::job::{JobStatus, ParseStatusError};

/// Sentinel a remote worker returns when it has no record of a job
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Result of a single remote status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// The worker reported one of the known statuses
    Known(JobStatus),
    /// The worker has no record of the job, or is not reachable
    Unknown,
    /// The query itself failed (connection or protocol error)
    Failed,
}

impl RemoteStatus {
    /// Parses a status string as reported by the worker
    pub fn from_wire(value: &str) -> Result<Self, ParseStatusError> {
        if value == UNKNOWN_STATUS {
            return Ok(RemoteStatus::Unknown);
        }
        value.parse().map(RemoteStatus::Known)
    }

    /// The status value this observation stands for
    ///
    /// A failed query counts as `FINISHED`: the worker is presumed to have
    /// lost track of the job.
    pub fn as_status(&self) -> Option<JobStatus> {
        match self {
            RemoteStatus::Known(status) => Some(*status),
            RemoteStatus::Unknown => None,
            RemoteStatus::Failed => Some(JobStatus::Finished),
        }
    }
}
