//! Tether Client
//!
//! Access to the remote worker that executes scheduled jobs.
//!
//! This crate defines the interface the scheduler consumes
//! ([`RemoteWorker`] and [`StatusClient`]) and ships two implementations:
//! - [`HttpRemoteWorker`]: a worker reachable over HTTP
//! - [`InMemoryWorker`]: a status table held in memory
//!
//! # Example
//!
//! ```no_run
//! use tether_client::{HttpRemoteWorker, RemoteWorker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tether_client::ClientError> {
//!     let worker = HttpRemoteWorker::new("http://localhost:8080");
//!     worker.reference();
//!
//!     let client = worker.acquire_client().await?;
//!     let status = client.get_status("job-1").await;
//!     worker.release_client(client);
//!
//!     println!("Remote status: {}", status?);
//!     Ok(())
//! }
//! ```

pub mod error;
mod http;
mod memory;
mod worker;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use http::{HttpRemoteWorker, HttpWorkerClient};
pub use memory::InMemoryWorker;
pub use worker::{RemoteWorker, StatusClient};
