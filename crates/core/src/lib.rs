//! Listrack Core - hit tracking domain logic.
//!
//! This crate contains the write-behind aggregation engine for listing
//! impression and click tracking: request-scoped accumulators, the shared
//! pending queue, and the lock-guarded batch processor. It is
//! database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` crate.

pub mod constants;
pub mod errors;
pub mod processor;
pub mod queue;
pub mod tracking;

// Re-export common types from the tracking module
pub use tracking::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
