//! Tether Scheduler
//!
//! Schedules jobs onto a single remote worker.
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Jobs: identity, status and an opaque payload
//! - Scheduler: FIFO queue, concurrency limit and the dispatch loop
//! - Runner: one execution attempt, reconciling local and remote status
//! - Poller: background status queries against the worker
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tether_client::InMemoryWorker;
//! use tether_scheduler::{Job, JobPayload, Scheduler, SchedulerConfig};
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl JobPayload for Hello {
//!     async fn run(&self, _job: &Job) -> anyhow::Result<Option<serde_json::Value>> {
//!         Ok(Some(serde_json::json!("hello")))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let worker = Arc::new(InMemoryWorker::new());
//!     let scheduler = Scheduler::new(&SchedulerConfig::default(), worker, None);
//!     let dispatch = scheduler.start();
//!
//!     scheduler.submit(Arc::new(Job::new(Hello)))?;
//!
//!     scheduler.stop();
//!     dispatch.await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod listener;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use job::{Job, JobPayload, JobSnapshot};
pub use listener::{JobListener, SchedulerListener};
pub use scheduler::{PollSchedule, Scheduler};
pub use tether_core::JobStatus;
