//! Tether Core
//!
//! Core types shared by the Tether scheduler and its remote worker adapters.
//!
//! This crate contains:
//! - Domain types: job status names and remote status observations
//! - Parsing of the status strings reported by a remote worker

pub mod domain;

pub use domain::job::{JobStatus, ParseStatusError};
pub use domain::status::{RemoteStatus, UNKNOWN_STATUS};
