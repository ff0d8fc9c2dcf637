//! Tracking engine error types.

use thiserror::Error;

use super::tracking_model::{HitKind, ListingId};

/// Errors raised by the batch processor during a drain pass.
///
/// Lock contention is deliberately absent: a busy lock is not a failure,
/// the pass reports a skipped outcome and the next trigger retries.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// A canonical store write failed for one listing. The delta for that
    /// listing is dropped for the current pass; future increments for the
    /// same listing keep accumulating normally.
    #[error("store write failed for listing {listing_id} ({kind}): {reason}")]
    StoreWrite {
        listing_id: ListingId,
        kind: HitKind,
        reason: String,
    },

    /// The pending queue could not be read. The pass stops for the affected
    /// kind with its pending deltas left queued for the next trigger.
    #[error("pending queue read failed: {0}")]
    QueueRead(String),
}

/// Invalid engine configuration, surfaced once at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
