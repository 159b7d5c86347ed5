//! Core domain types
//!
//! These types are shared between the scheduler (which tracks jobs locally)
//! and the client adapters (which read status strings from a remote worker).

pub mod job;
pub mod status;
