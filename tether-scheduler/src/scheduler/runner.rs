//! Job runner
//!
//! Drives one execution attempt of one job. Two signals decide the job's
//! status: the local return of its payload, and what the status poller
//! reads from the remote worker while the payload runs. The runner also
//! tells the dispatch loop when the job has reached the worker.

use anyhow::anyhow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tether_core::{JobStatus, RemoteStatus};
use tracing::{debug, error, info, warn};

use super::Scheduler;
use super::poller::{StatusObserver, StatusPoller};
use crate::job::Job;

/// Reconciliation state shared between a runner and its poller
pub(crate) struct RunState {
    job: Arc<Job>,
    executed: AtomicBool,
    submitted: AtomicBool,
}

impl RunState {
    pub(crate) fn new(job: Arc<Job>) -> Self {
        Self {
            job,
            executed: AtomicBool::new(false),
            submitted: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    fn mark_executed(&self) {
        self.executed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::SeqCst)
    }

    fn mark_submitted(&self) {
        self.submitted.store(true, Ordering::SeqCst);
    }

    /// Status implied by the local outcome alone
    fn local_status(&self) -> JobStatus {
        if self.job.is_aborted() {
            JobStatus::Abort
        } else if self.job.has_failure() {
            JobStatus::Error
        } else {
            JobStatus::Finished
        }
    }

    /// Final status once the payload has returned
    ///
    /// An abort or a captured failure wins over anything the worker says.
    /// Otherwise a terminal remote status is kept, and everything else
    /// (non-terminal, unknown, unreachable) resolves to `FINISHED`.
    pub(crate) fn final_status(&self, last: RemoteStatus) -> JobStatus {
        match (self.local_status(), last.as_status()) {
            (JobStatus::Finished, Some(remote)) if remote.is_terminal() => remote,
            (local, _) => local,
        }
    }

    fn apply(&self, status: JobStatus) {
        if self.job.status() != status {
            self.job.set_status(status);
        }
    }
}

impl StatusObserver for RunState {
    fn observe(&self, job_id: &str, status: Option<JobStatus>) {
        let executed = self.is_executed();

        let Some(status) = status else {
            // Not on the worker: either not there yet, or already gone.
            if executed {
                self.mark_submitted();
                self.apply(self.local_status());
                self.job.signal();
            }
            return;
        };

        if !executed {
            if status.is_terminal() {
                debug!(
                    "Ignoring status {} for job {}, left over from a previous run",
                    status, job_id
                );
                return;
            }
            if status == JobStatus::Running {
                self.mark_submitted();
            }
        } else {
            self.mark_submitted();
        }

        self.apply(status);
        self.job.signal();
    }
}

/// Executes a job exactly once on behalf of a scheduler
pub(crate) struct JobRunner {
    scheduler: Scheduler,
    job: Arc<Job>,
    state: Arc<RunState>,
    finished: AtomicBool,
}

impl JobRunner {
    pub(crate) fn new(scheduler: Scheduler, job: Arc<Job>) -> Self {
        let state = Arc::new(RunState::new(Arc::clone(&job)));
        Self {
            scheduler,
            job,
            state,
            finished: AtomicBool::new(false),
        }
    }

    /// Whether the worker has confirmed it received the job
    pub(crate) fn submitted_to_remote(&self) -> bool {
        self.state.is_submitted()
    }

    /// Whether this runner is done with the job
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Runs one attempt and takes the job out of the running set
    ///
    /// The attempt gets its own task, so a panicking listener hook still
    /// lets the job leave the running set and the dispatch loop move on.
    pub(crate) async fn run(self: Arc<Self>) {
        let observer: Arc<dyn StatusObserver> = self.state.clone();
        let poller = StatusPoller::new(
            self.job.id(),
            self.scheduler.worker(),
            observer,
            self.scheduler.poll_schedule(),
        );

        let attempt = tokio::spawn(Arc::clone(&self).attempt(Arc::clone(&poller)));
        if let Err(e) = attempt.await {
            error!("Runner for job {} panicked: {}", self.job.id(), e);
            poller.shutdown();
            if !self.job.status().is_terminal() {
                self.job.store_status(JobStatus::Error);
            }
        }

        // allow the job to be submitted again
        self.job.clear_aborted();

        self.finish();
    }

    async fn attempt(self: Arc<Self>, poller: Arc<StatusPoller>) {
        let job_id = self.job.id().to_string();

        if self.job.is_aborted() {
            info!("Job {} was aborted before it started", job_id);
            self.job.set_status(JobStatus::Abort);
            return;
        }

        let poll_task = poller.spawn();

        if let Some(listener) = self.scheduler.listener() {
            listener.job_started(&self.scheduler, &self.job);
        }

        info!("Executing job {}", job_id);
        let job = Arc::clone(&self.job);
        if let Err(e) = tokio::spawn(async move { job.execute().await }).await {
            error!("Job {} panicked: {}", job_id, e);
            self.job
                .record_failure(anyhow!("job {} panicked: {}", job_id, e));
        }
        self.state.mark_executed();

        poller.shutdown();
        if let Err(e) = poll_task.await {
            warn!("Status poller for job {} panicked: {}", job_id, e);
        }

        let last = poller.query().await;
        let status = self.state.final_status(last);
        self.state.apply(status);
        info!("Job {} finished with status {}", job_id, status);

        if let Some(listener) = self.scheduler.listener() {
            listener.job_finished(&self.scheduler, &self.job);
        }
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.scheduler.remove_running(&self.job);
        self.job.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Sleep;
    use std::time::Duration;

    fn state() -> RunState {
        RunState::new(Arc::new(Job::with_id(
            "job-1",
            Sleep::new(Duration::ZERO),
        )))
    }

    #[test]
    fn test_unknown_before_execution_is_ignored() {
        let state = state();
        state.observe("job-1", None);
        assert_eq!(state.job.status(), JobStatus::Pending);
        assert!(!state.is_submitted());
    }

    #[test]
    fn test_terminal_status_before_execution_is_stale() {
        for stale in [JobStatus::Finished, JobStatus::Error, JobStatus::Abort] {
            let state = state();
            state.observe("job-1", Some(stale));
            assert_eq!(state.job.status(), JobStatus::Pending);
            assert!(!state.is_submitted());
        }
    }

    #[test]
    fn test_running_confirms_submission() {
        let state = state();
        state.observe("job-1", Some(JobStatus::Running));
        assert_eq!(state.job.status(), JobStatus::Running);
        assert!(state.is_submitted());
    }

    #[test]
    fn test_ready_is_applied_without_confirming_submission() {
        let state = state();
        state.observe("job-1", Some(JobStatus::Ready));
        assert_eq!(state.job.status(), JobStatus::Ready);
        assert!(!state.is_submitted());
    }

    #[test]
    fn test_any_status_after_execution_confirms_submission() {
        let state = state();
        state.mark_executed();
        state.observe("job-1", Some(JobStatus::Error));
        assert_eq!(state.job.status(), JobStatus::Error);
        assert!(state.is_submitted());
    }

    #[test]
    fn test_unknown_after_execution_finalizes() {
        let state = state();
        state.mark_executed();
        state.observe("job-1", None);
        assert_eq!(state.job.status(), JobStatus::Finished);
        assert!(state.is_submitted());

        let state = self::state();
        state.job.record_failure(anyhow!("boom"));
        state.mark_executed();
        state.observe("job-1", None);
        assert_eq!(state.job.status(), JobStatus::Error);

        let state = self::state();
        state.job.abort();
        state.job.record_failure(anyhow!("boom"));
        state.mark_executed();
        state.observe("job-1", None);
        assert_eq!(state.job.status(), JobStatus::Abort);
    }

    #[test]
    fn test_final_status_resolution() {
        let state = state();
        assert_eq!(state.final_status(RemoteStatus::Unknown), JobStatus::Finished);
        assert_eq!(
            state.final_status(RemoteStatus::Known(JobStatus::Running)),
            JobStatus::Finished
        );
        assert_eq!(
            state.final_status(RemoteStatus::Known(JobStatus::Error)),
            JobStatus::Error
        );
        assert_eq!(state.final_status(RemoteStatus::Failed), JobStatus::Finished);

        state.job.record_failure(anyhow!("boom"));
        assert_eq!(
            state.final_status(RemoteStatus::Known(JobStatus::Running)),
            JobStatus::Error
        );
        assert_eq!(
            state.final_status(RemoteStatus::Known(JobStatus::Finished)),
            JobStatus::Error
        );

        state.job.abort();
        assert_eq!(state.final_status(RemoteStatus::Unknown), JobStatus::Abort);
    }
}
