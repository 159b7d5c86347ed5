//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Job execution status
///
/// The variant names double as the wire names a remote worker reports
/// (`"PENDING"`, `"RUNNING"`, ...), so they must not be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Ready,
    Finished,
    Error,
    Abort,
}

impl JobStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Ready,
        JobStatus::Finished,
        JobStatus::Error,
        JobStatus::Abort,
    ];

    /// Returns the wire name of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Ready => "READY",
            JobStatus::Finished => "FINISHED",
            JobStatus::Error => "ERROR",
            JobStatus::Abort => "ABORT",
        }
    }

    /// Whether the job can no longer change state on its own
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Error | JobStatus::Abort
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string that is not one of the six known names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized job status: {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_names() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("finished".parse::<JobStatus>().is_err());
        assert!("Unknown".parse::<JobStatus>().is_err());
        assert_eq!(
            "DONE".parse::<JobStatus>(),
            Err(ParseStatusError("DONE".to_string()))
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Abort.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Ready.is_terminal());
    }

    #[test]
    fn test_serializes_as_wire_name() {
        let json = serde_json::to_string(&JobStatus::Abort).unwrap();
        assert_eq!(json, "\"ABORT\"");
    }
}
