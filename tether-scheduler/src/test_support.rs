//! Payloads and listeners shared by the unit tests

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_client::InMemoryWorker;
use tether_core::JobStatus;
use tokio::time::{self, Instant};

use crate::config::SchedulerConfig;
use crate::job::{Job, JobPayload};
use crate::listener::{JobListener, SchedulerListener};
use crate::scheduler::{PollSchedule, Scheduler, StatusObserver};

/// Sleeps, then succeeds; never touches the worker
pub(crate) struct Sleep {
    duration: Duration,
}

impl Sleep {
    pub(crate) fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl JobPayload for Sleep {
    async fn run(&self, _job: &Job) -> anyhow::Result<Option<JsonValue>> {
        time::sleep(self.duration).await;
        Ok(None)
    }
}

/// Tracks how many payloads run at once
#[derive(Default)]
pub(crate) struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Behaves like a job the worker picks up: it shows up on the worker
/// (RUNNING unless told otherwise) while it sleeps, and is forgotten by the
/// worker once done
pub(crate) struct RemoteSleep {
    pub(crate) worker: Arc<InMemoryWorker>,
    pub(crate) status: JobStatus,
    pub(crate) duration: Duration,
    pub(crate) gauge: Arc<Gauge>,
    /// Leave the job RUNNING on the worker after returning
    pub(crate) leave_running: bool,
    pub(crate) failure: Option<&'static str>,
}

impl RemoteSleep {
    pub(crate) fn new(worker: &Arc<InMemoryWorker>, duration: Duration) -> Self {
        Self {
            worker: Arc::clone(worker),
            status: JobStatus::Running,
            duration,
            gauge: Arc::new(Gauge::default()),
            leave_running: false,
            failure: None,
        }
    }
}

#[async_trait]
impl JobPayload for RemoteSleep {
    async fn run(&self, job: &Job) -> anyhow::Result<Option<JsonValue>> {
        self.gauge.enter();
        self.worker.set_status(job.id(), self.status);
        time::sleep(self.duration).await;
        if !self.leave_running {
            self.worker.clear_status(job.id());
        }
        self.gauge.leave();

        match self.failure {
            Some(failure) => anyhow::bail!(failure),
            None => Ok(None),
        }
    }
}

/// Records scheduler events as "started:<id>" / "finished:<id>:<status>"
#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("started:").map(str::to_string))
            .collect()
    }
}

impl SchedulerListener for RecordingListener {
    fn job_started(&self, _scheduler: &Scheduler, job: &Job) {
        self.events
            .lock()
            .unwrap()
            .push(format!("started:{}", job.id()));
    }

    fn job_finished(&self, _scheduler: &Scheduler, job: &Job) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finished:{}:{}", job.id(), job.status()));
    }
}

#[derive(Default)]
pub(crate) struct RecordingJobListener {
    changes: Mutex<Vec<(JobStatus, JobStatus)>>,
    progress: Mutex<Vec<u8>>,
}

impl RecordingJobListener {
    pub(crate) fn changes(&self) -> Vec<(JobStatus, JobStatus)> {
        self.changes.lock().unwrap().clone()
    }

    pub(crate) fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }
}

impl JobListener for RecordingJobListener {
    fn after_status_change(&self, _job: &Job, before: JobStatus, after: JobStatus) {
        self.changes.lock().unwrap().push((before, after));
    }

    fn on_progress_update(&self, _job: &Job, progress: u8) {
        self.progress.lock().unwrap().push(progress);
    }
}

/// Panics when the job is about to take the given status
pub(crate) struct PanickingJobListener(pub(crate) JobStatus);

impl JobListener for PanickingJobListener {
    fn before_status_change(&self, job: &Job, _before: JobStatus, after: JobStatus) {
        if after == self.0 {
            panic!("listener for job {} refused status {}", job.id(), after);
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    observed: Mutex<Vec<Option<JobStatus>>>,
}

impl RecordingObserver {
    pub(crate) fn observed(&self) -> Vec<Option<JobStatus>> {
        self.observed.lock().unwrap().clone()
    }
}

impl StatusObserver for RecordingObserver {
    fn observe(&self, _job_id: &str, status: Option<JobStatus>) {
        self.observed.lock().unwrap().push(status);
    }
}

/// Configuration with short waits so tests settle quickly
pub(crate) fn fast_config(max_concurrency: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrency,
        dispatch_wait: Duration::from_millis(50),
        submission_wait: Duration::from_millis(20),
        poll: PollSchedule {
            initial_period: Duration::from_millis(100),
            initial_interval: Duration::from_millis(5),
            check_interval: Duration::from_millis(20),
        },
        ..SchedulerConfig::default()
    }
}

/// Polls `condition` until it holds or `timeout` passes
pub(crate) async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
