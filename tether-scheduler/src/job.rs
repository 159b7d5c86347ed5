//! Jobs
//!
//! A job pairs an identity and a scheduler-managed status with an opaque
//! payload. The payload decides what running the job means; the scheduler
//! only sees whether it returned, failed, or was aborted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tether_core::JobStatus;
use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::listener::JobListener;

/// The work a job performs
#[async_trait]
pub trait JobPayload: Send + Sync {
    /// Runs the payload to completion
    ///
    /// # Arguments
    /// * `job` - The job being executed, for its id and progress reporting
    ///
    /// # Returns
    /// Optional JSON output, kept as the job's result
    async fn run(&self, job: &Job) -> anyhow::Result<Option<JsonValue>>;
}

/// Outcome of the latest execution attempt
#[derive(Debug, Default)]
struct Execution {
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failure: Option<anyhow::Error>,
    result: Option<JsonValue>,
}

/// A unit of work submitted to a scheduler
pub struct Job {
    id: String,
    created_at: DateTime<Utc>,
    payload: Box<dyn JobPayload>,
    listener: Option<Arc<dyn JobListener>>,
    status: Mutex<JobStatus>,
    aborted: AtomicBool,
    execution: Mutex<Execution>,
    /// Signalled whenever the remote side tells us something about the job
    signal: Notify,
}

impl Job {
    /// Creates a job with a fresh random id
    pub fn new(payload: impl JobPayload + 'static) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), payload)
    }

    /// Creates a job with a caller-chosen id
    ///
    /// Reusing an id across runs is allowed: statuses the remote worker still
    /// holds for a previous run are ignored until the new run has executed.
    pub fn with_id(id: impl Into<String>, payload: impl JobPayload + 'static) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            payload: Box::new(payload),
            listener: None,
            status: Mutex::new(JobStatus::Pending),
            aborted: AtomicBool::new(false),
            execution: Mutex::new(Execution::default()),
            signal: Notify::new(),
        }
    }

    /// Attaches a listener for status and progress changes
    pub fn with_listener(mut self, listener: Arc<dyn JobListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> JobStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assigns a new status, firing the listener hooks around the change
    pub(crate) fn set_status(&self, status: JobStatus) {
        let before = self.status();

        if let Some(listener) = &self.listener {
            listener.before_status_change(self, before, status);
        }

        self.store_status(status);
        debug!("Job {} status {} -> {}", self.id, before, status);

        if let Some(listener) = &self.listener {
            listener.after_status_change(self, before, status);
        }
    }

    /// Assigns a new status without notifying the listener
    pub(crate) fn store_status(&self, status: JobStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Requests that the job not be started
    ///
    /// Only checked when a runner picks the job up; an execution already in
    /// progress is not interrupted, but its final status becomes `ABORT`.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_aborted(&self) {
        self.aborted.store(false, Ordering::SeqCst);
    }

    /// Error captured from the latest execution, if it failed
    pub fn failure(&self) -> Option<String> {
        self.execution()
            .failure
            .as_ref()
            .map(|e| format!("{:#}", e))
    }

    pub fn has_failure(&self) -> bool {
        self.execution().failure.is_some()
    }

    pub(crate) fn record_failure(&self, error: anyhow::Error) {
        self.execution().failure = Some(error);
    }

    /// Output of the latest successful execution
    pub fn result(&self) -> Option<JsonValue> {
        self.execution().result.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.execution().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.execution().finished_at
    }

    /// Forwards a progress update from the payload to the listener
    pub fn report_progress(&self, progress: u8) {
        if let Some(listener) = &self.listener {
            listener.on_progress_update(self, progress.min(100));
        }
    }

    /// Runs the payload once, capturing its result or failure
    pub(crate) async fn execute(&self) {
        {
            let mut execution = self.execution();
            *execution = Execution {
                started_at: Some(Utc::now()),
                ..Execution::default()
            };
        }

        let outcome = self.payload.run(self).await;

        let mut execution = self.execution();
        execution.finished_at = Some(Utc::now());
        match outcome {
            Ok(result) => execution.result = result,
            Err(e) => {
                warn!("Job {} failed: {:#}", self.id, e);
                execution.failure = Some(e);
            }
        }
    }

    pub(crate) fn signal(&self) {
        self.signal.notify_one();
    }

    /// Waits for the next signal, or until `timeout` elapses
    pub(crate) async fn wait_signal(&self, timeout: Duration) {
        let _ = time::timeout(timeout, self.signal.notified()).await;
    }

    /// Point-in-time view of the job, suitable for reporting
    pub fn snapshot(&self) -> JobSnapshot {
        let execution = self.execution();
        JobSnapshot {
            id: self.id.clone(),
            status: self.status(),
            aborted: self.is_aborted(),
            created_at: self.created_at,
            started_at: execution.started_at,
            finished_at: execution.finished_at,
            failure: execution.failure.as_ref().map(|e| format!("{:#}", e)),
            result: execution.result.clone(),
        }
    }

    fn execution(&self) -> MutexGuard<'_, Execution> {
        self.execution.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Serializable view of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub aborted: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
    pub result: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingJobListener;

    struct Echo;

    #[async_trait]
    impl JobPayload for Echo {
        async fn run(&self, job: &Job) -> anyhow::Result<Option<JsonValue>> {
            job.report_progress(50);
            job.report_progress(250);
            Ok(Some(serde_json::json!({ "echo": job.id() })))
        }
    }

    struct Broken;

    #[async_trait]
    impl JobPayload for Broken {
        async fn run(&self, _job: &Job) -> anyhow::Result<Option<JsonValue>> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new(Echo);
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(!job.is_aborted());
        assert!(!job.has_failure());
        assert!(job.started_at().is_none());
        assert!(Uuid::parse_str(job.id()).is_ok());
    }

    #[test]
    fn test_status_hooks_fire_around_change() {
        let listener = Arc::new(RecordingJobListener::default());
        let job = Job::with_id("job-1", Echo).with_listener(listener.clone());

        job.set_status(JobStatus::Running);
        job.set_status(JobStatus::Finished);

        assert_eq!(
            listener.changes(),
            vec![
                (JobStatus::Pending, JobStatus::Running),
                (JobStatus::Running, JobStatus::Finished),
            ]
        );
        assert_eq!(job.status(), JobStatus::Finished);
    }

    #[tokio::test]
    async fn test_execute_keeps_result_and_progress() {
        let listener = Arc::new(RecordingJobListener::default());
        let job = Job::with_id("job-1", Echo).with_listener(listener.clone());

        job.execute().await;

        assert!(!job.has_failure());
        assert_eq!(job.result(), Some(serde_json::json!({ "echo": "job-1" })));
        assert_eq!(listener.progress(), vec![50, 100]);
        assert!(job.started_at().is_some());
        assert!(job.finished_at() >= job.started_at());
    }

    #[tokio::test]
    async fn test_execute_captures_failure() {
        let job = Job::new(Broken);

        job.execute().await;

        assert!(job.has_failure());
        assert_eq!(job.failure().as_deref(), Some("disk full"));
        assert!(job.result().is_none());
        // execution alone never touches the status
        assert_eq!(job.status(), JobStatus::Pending);
    }

    #[test]
    fn test_abort_flag() {
        let job = Job::new(Echo);
        job.abort();
        assert!(job.is_aborted());
        job.clear_aborted();
        assert!(!job.is_aborted());
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let job = Job::with_id("job-7", Broken);
        job.execute().await;
        job.set_status(JobStatus::Error);

        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["id"], "job-7");
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["failure"], "disk full");
        assert!(json["result"].is_null());
    }
}
