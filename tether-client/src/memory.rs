//! In-memory remote worker
//!
//! Keeps a status table keyed by job id instead of talking to a real
//! process. Useful for tests and for driving the scheduler locally: the
//! owner sets statuses as the "remote" side would, and every query,
//! checkout and release is counted.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tether_core::{JobStatus, UNKNOWN_STATUS};

use crate::error::{ClientError, Result};
use crate::worker::{RemoteWorker, StatusClient};

#[derive(Debug, Default)]
struct WorkerState {
    statuses: HashMap<String, String>,
    queries: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<WorkerState>,
    fail_queries: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Remote worker backed by an in-memory status table
///
/// Starts with a single reference, so it is reachable right away.
#[derive(Debug)]
pub struct InMemoryWorker {
    shared: Arc<Shared>,
    references: AtomicI64,
    acquired: AtomicUsize,
    released: AtomicUsize,
    fail_acquire: AtomicBool,
}

impl InMemoryWorker {
    /// Creates a reachable worker with no known jobs
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            references: AtomicI64::new(1),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            fail_acquire: AtomicBool::new(false),
        }
    }

    /// Adds a reference and returns the new count
    pub fn reference(&self) -> i64 {
        self.references.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drops a reference and returns the new count
    pub fn dereference(&self) -> i64 {
        self.references.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Records the status the worker reports for a job
    pub fn set_status(&self, job_id: &str, status: JobStatus) {
        self.set_raw_status(job_id, status.as_str());
    }

    /// Records an arbitrary status string, valid or not
    pub fn set_raw_status(&self, job_id: &str, status: &str) {
        self.shared
            .lock()
            .statuses
            .insert(job_id.to_string(), status.to_string());
    }

    /// Forgets a job, so the worker answers `"Unknown"` for it
    pub fn clear_status(&self, job_id: &str) {
        self.shared.lock().statuses.remove(job_id);
    }

    /// Makes every subsequent checkout fail
    pub fn set_fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent status query fail with a protocol error
    pub fn set_fail_queries(&self, fail: bool) {
        self.shared.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Total number of status queries answered or failed
    pub fn query_count(&self) -> usize {
        self.shared.lock().queries.values().sum()
    }

    /// Number of status queries issued for one job
    pub fn query_count_for(&self, job_id: &str) -> usize {
        self.shared
            .lock()
            .queries
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of successful checkouts
    pub fn acquired_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Number of clients handed back
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteWorker for InMemoryWorker {
    fn reference_count(&self) -> i64 {
        self.references.load(Ordering::SeqCst)
    }

    async fn acquire_client(&self) -> Result<Box<dyn StatusClient>> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable(
                "in-memory worker refused the checkout".to_string(),
            ));
        }

        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryClient {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn release_client(&self, client: Box<dyn StatusClient>) {
        drop(client);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Client checked out from an [`InMemoryWorker`]
struct InMemoryClient {
    shared: Arc<Shared>,
}

#[async_trait]
impl StatusClient for InMemoryClient {
    async fn get_status(&self, job_id: &str) -> Result<String> {
        let mut state = self.shared.lock();
        *state.queries.entry(job_id.to_string()).or_insert(0) += 1;

        if self.shared.fail_queries.load(Ordering::SeqCst) {
            return Err(ClientError::Protocol(format!(
                "status query for job {} was dropped",
                job_id
            )));
        }

        Ok(state
            .statuses
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string()))
    }
}
