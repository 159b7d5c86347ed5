//! Status poller
//!
//! Asks the remote worker for one job's status until shut down. Polling is
//! fast right after the job starts, to catch short jobs promptly, and slows
//! down afterwards to bound the load on the worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tether_client::RemoteWorker;
use tether_core::{JobStatus, RemoteStatus};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, trace};

/// Two-phase polling interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// How long the fast phase lasts after the poller starts
    pub initial_period: Duration,
    /// Wait between polls during the fast phase
    pub initial_interval: Duration,
    /// Wait between polls afterwards
    pub check_interval: Duration,
}

impl PollSchedule {
    /// The wait before the next poll, given the time since the poller started
    pub fn interval_at(&self, elapsed: Duration) -> Duration {
        if elapsed < self.initial_period {
            self.initial_interval
        } else {
            self.check_interval
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_period: Duration::from_millis(1500),
            initial_interval: Duration::from_millis(100),
            check_interval: Duration::from_millis(500),
        }
    }
}

/// Receives the statuses a poller reads from the worker
///
/// `None` means the worker answered that it has no record of the job.
pub trait StatusObserver: Send + Sync {
    fn observe(&self, job_id: &str, status: Option<JobStatus>);
}

/// Polls the remote status of a single job
pub struct StatusPoller {
    job_id: String,
    worker: Arc<dyn RemoteWorker>,
    observer: Arc<dyn StatusObserver>,
    schedule: PollSchedule,
    terminate: AtomicBool,
    wake: Notify,
}

impl StatusPoller {
    pub fn new(
        job_id: impl Into<String>,
        worker: Arc<dyn RemoteWorker>,
        observer: Arc<dyn StatusObserver>,
        schedule: PollSchedule,
    ) -> Arc<Self> {
        Arc::new(Self {
            job_id: job_id.into(),
            worker,
            observer,
            schedule,
            terminate: AtomicBool::new(false),
            wake: Notify::new(),
        })
    }

    /// Starts the polling loop on its own task
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move { poller.run().await })
    }

    async fn run(&self) {
        debug!("Status poller started for job {}", self.job_id);
        let started = Instant::now();

        while !self.is_shutdown() {
            let interval = self.schedule.interval_at(started.elapsed());
            let _ = time::timeout(interval, self.wake.notified()).await;

            if self.is_shutdown() {
                break;
            }

            let status = self.query().await;
            trace!("Job {} remote status: {:?}", self.job_id, status);
        }

        debug!("Status poller stopped for job {}", self.job_id);
    }

    /// Stops the loop and cuts its current wait short
    pub fn shutdown(&self) {
        self.terminate.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Queries the worker once
    ///
    /// Known statuses and the worker's own "Unknown" answer are reported to
    /// the observer. An unreachable worker or an unparseable answer count as
    /// unknown for this query only; a failed query counts as finished.
    /// Neither is reported.
    pub async fn query(&self) -> RemoteStatus {
        if self.worker.reference_count() <= 0 {
            debug!(
                "Worker not referenced, status of job {} is unknown",
                self.job_id
            );
            return RemoteStatus::Unknown;
        }

        let client = match self.worker.acquire_client().await {
            Ok(client) => client,
            Err(e) => {
                error!("Can't get status information for job {}: {}", self.job_id, e);
                return RemoteStatus::Failed;
            }
        };

        let response = client.get_status(&self.job_id).await;
        self.worker.release_client(client);

        let raw = match response {
            Ok(raw) => raw,
            Err(e) => {
                error!("Can't get status information for job {}: {}", self.job_id, e);
                return RemoteStatus::Failed;
            }
        };

        match RemoteStatus::from_wire(&raw) {
            Ok(RemoteStatus::Known(status)) => {
                self.observer.observe(&self.job_id, Some(status));
                RemoteStatus::Known(status)
            }
            Ok(_) => {
                self.observer.observe(&self.job_id, None);
                RemoteStatus::Unknown
            }
            Err(e) => {
                error!("Unknown status for job {}: {}", self.job_id, e);
                RemoteStatus::Unknown
            }
        }
    }
}
