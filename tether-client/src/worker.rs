//! Remote worker interface
//!
//! A remote worker executes job payloads and answers status queries by job
//! id. The scheduler only ever talks to it through these two traits, so the
//! transport and the client pool behind them are interchangeable.

use async_trait::async_trait;

use crate::error::Result;

/// A client checked out from a remote worker's pool
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Asks the worker for the status of a job
    ///
    /// Returns one of the six status names, or `"Unknown"` when the worker
    /// has no record of the job.
    async fn get_status(&self, job_id: &str) -> Result<String>;
}

/// Reference-counted handle to one remote worker
#[async_trait]
pub trait RemoteWorker: Send + Sync {
    /// Number of live references to the worker
    ///
    /// A count of zero or less means the worker is not reachable.
    fn reference_count(&self) -> i64;

    /// Checks a client out of the pool
    async fn acquire_client(&self) -> Result<Box<dyn StatusClient>>;

    /// Returns a client to the pool
    ///
    /// Must be called exactly once for every successful `acquire_client`.
    fn release_client(&self, client: Box<dyn StatusClient>);
}
