//! Scheduler layer
//!
//! Queues submitted jobs and hands them, in submission order, to a single
//! remote worker while keeping at most `max_concurrency` of them running.
//! The dispatch loop does not move on to the next job until the current
//! one has been confirmed on the worker, so the worker sees jobs in the
//! order they were accepted.

pub mod poller;
mod runner;

pub use poller::{PollSchedule, StatusObserver, StatusPoller};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tether_client::RemoteWorker;
use tether_core::JobStatus;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::job::Job;
use crate::listener::SchedulerListener;
use runner::JobRunner;

/// Jobs waiting for dispatch and jobs handed to a runner
#[derive(Default)]
struct Queues {
    waiting: VecDeque<Arc<Job>>,
    running: Vec<Arc<Job>>,
}

impl Queues {
    fn contains(&self, job_id: &str) -> bool {
        self.waiting
            .iter()
            .chain(self.running.iter())
            .any(|job| job.id() == job_id)
    }
}

struct Inner {
    name: String,
    max_concurrency: AtomicUsize,
    dispatch_wait: Duration,
    submission_wait: Duration,
    poll_schedule: PollSchedule,
    terminate: AtomicBool,
    /// Set once a dispatch loop has started; only one may ever run
    dispatching: AtomicBool,
    queues: Mutex<Queues>,
    /// Wakes the dispatch loop when the queues or the limit change
    queue_changed: Notify,
    worker: Arc<dyn RemoteWorker>,
    listener: Option<Arc<dyn SchedulerListener>>,
}

/// FIFO scheduler for one remote worker
///
/// Cheap to clone; clones share the same queues and dispatch loop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a scheduler; call [`start`](Self::start) to begin dispatching
    pub fn new(
        config: &SchedulerConfig,
        worker: Arc<dyn RemoteWorker>,
        listener: Option<Arc<dyn SchedulerListener>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: config.name.clone(),
                max_concurrency: AtomicUsize::new(config.max_concurrency),
                dispatch_wait: config.dispatch_wait,
                submission_wait: config.submission_wait,
                poll_schedule: config.poll,
                terminate: AtomicBool::new(false),
                dispatching: AtomicBool::new(false),
                queues: Mutex::new(Queues::default()),
                queue_changed: Notify::new(),
                worker,
                listener,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency.load(Ordering::SeqCst)
    }

    /// Changes the concurrency limit and wakes the dispatch loop
    pub fn set_max_concurrency(&self, max_concurrency: usize) {
        info!(
            "Scheduler {}: max concurrency set to {}",
            self.inner.name, max_concurrency
        );
        self.inner
            .max_concurrency
            .store(max_concurrency, Ordering::SeqCst);
        self.inner.queue_changed.notify_one();
    }

    /// Queues a job behind every job submitted before it
    ///
    /// The job's status becomes `PENDING`. A job whose id is already queued
    /// or running is rejected.
    pub fn submit(&self, job: Arc<Job>) -> Result<()> {
        if self.queues().contains(job.id()) {
            return Err(SchedulerError::AlreadyScheduled(job.id().to_string()));
        }

        job.set_status(JobStatus::Pending);

        {
            let mut queues = self.queues();
            if queues.contains(job.id()) {
                return Err(SchedulerError::AlreadyScheduled(job.id().to_string()));
            }
            queues.waiting.push_back(Arc::clone(&job));
        }

        if self.is_stopped() {
            warn!(
                "Scheduler {} is stopped, job {} will not be dispatched",
                self.inner.name,
                job.id()
            );
        } else {
            debug!("Scheduler {}: queued job {}", self.inner.name, job.id());
        }

        self.inner.queue_changed.notify_one();
        Ok(())
    }

    /// Asks the dispatch loop to exit
    ///
    /// Does not wait for, or cancel, jobs that are already running.
    pub fn stop(&self) {
        info!("Stopping scheduler {}", self.inner.name);
        self.inner.terminate.store(true, Ordering::SeqCst);
        self.inner.queue_changed.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.terminate.load(Ordering::SeqCst)
    }

    /// Jobs waiting for dispatch, oldest first
    pub fn jobs_waiting(&self) -> Vec<Arc<Job>> {
        self.queues().waiting.iter().cloned().collect()
    }

    /// Jobs currently handed to a runner
    pub fn jobs_running(&self) -> Vec<Arc<Job>> {
        self.queues().running.clone()
    }

    /// Spawns the dispatch loop on the current runtime
    ///
    /// Only the first call starts a loop; later calls return a handle that
    /// completes immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Runs the dispatch loop until [`stop`](Self::stop) is called
    ///
    /// Returns at once if a loop for this scheduler already ran.
    pub async fn run(&self) {
        if self.inner.dispatching.swap(true, Ordering::SeqCst) {
            warn!(
                "Scheduler {} already has a dispatch loop, not starting another",
                self.inner.name
            );
            return;
        }

        info!(
            "Starting dispatch loop for scheduler {} (max concurrency: {})",
            self.inner.name,
            self.max_concurrency()
        );

        while !self.is_stopped() {
            let Some(job) = self.next_job() else {
                let _ = time::timeout(
                    self.inner.dispatch_wait,
                    self.inner.queue_changed.notified(),
                )
                .await;
                continue;
            };

            debug!("Scheduler {}: dispatching job {}", self.inner.name, job.id());
            let runner = Arc::new(JobRunner::new(self.clone(), Arc::clone(&job)));
            tokio::spawn(Arc::clone(&runner).run());

            self.wait_for_handoff(&job, &runner).await;
        }

        info!("Dispatch loop for scheduler {} stopped", self.inner.name);
    }

    /// Moves the oldest waiting job to the running set, if the limit allows
    fn next_job(&self) -> Option<Arc<Job>> {
        let mut queues = self.queues();
        if queues.running.len() >= self.max_concurrency() {
            return None;
        }

        let job = queues.waiting.pop_front()?;
        queues.running.push(Arc::clone(&job));
        Some(job)
    }

    /// Blocks until the worker has the job, the runner is done, or the
    /// scheduler is stopped
    async fn wait_for_handoff(&self, job: &Job, runner: &JobRunner) {
        while !runner.submitted_to_remote() && !runner.is_finished() && !self.is_stopped() {
            job.wait_signal(self.inner.submission_wait).await;
        }
    }

    pub(crate) fn remove_running(&self, job: &Arc<Job>) {
        self.queues()
            .running
            .retain(|running| !Arc::ptr_eq(running, job));
        self.inner.queue_changed.notify_one();
    }

    pub(crate) fn worker(&self) -> Arc<dyn RemoteWorker> {
        Arc::clone(&self.inner.worker)
    }

    pub(crate) fn poll_schedule(&self) -> PollSchedule {
        self.inner.poll_schedule
    }

    pub(crate) fn listener(&self) -> Option<&Arc<dyn SchedulerListener>> {
        self.inner.listener.as_ref()
    }

    fn queues(&self) -> MutexGuard<'_, Queues> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.inner.name)
            .field("max_concurrency", &self.max_concurrency())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
