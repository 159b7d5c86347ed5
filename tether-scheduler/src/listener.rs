//! Listener interfaces
//!
//! Applications observe the scheduler through these traits. Every method
//! has an empty default, so implementors only override what they need.

use tether_core::JobStatus;

use crate::job::Job;
use crate::scheduler::Scheduler;

/// Observes jobs entering and leaving execution on a scheduler
pub trait SchedulerListener: Send + Sync {
    /// Called on the job's runner task right before the job executes
    fn job_started(&self, _scheduler: &Scheduler, _job: &Job) {}

    /// Called once the job's final status has been resolved
    fn job_finished(&self, _scheduler: &Scheduler, _job: &Job) {}
}

/// Observes a single job
///
/// Status hooks fire on every status assignment made by the scheduler.
/// Progress updates are never produced by the scheduler itself; they come
/// from the job's payload through [`Job::report_progress`].
pub trait JobListener: Send + Sync {
    fn before_status_change(&self, _job: &Job, _before: JobStatus, _after: JobStatus) {}

    fn after_status_change(&self, _job: &Job, _before: JobStatus, _after: JobStatus) {}

    fn on_progress_update(&self, _job: &Job, _progress: u8) {}
}
