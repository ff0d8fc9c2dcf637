//! Pending queue contract.
//!
//! The queue buffers per-listing hit deltas between request flushes and
//! drain passes. It holds one logical slot per hit kind, each mapping
//! listing ids to accumulated counts, with a TTL that is refreshed on every
//! merge. The TTL is a safety net against abandoned state, not a delivery
//! guarantee: expiry with unflushed data is accepted best-effort loss.

use std::collections::HashMap;

use thiserror::Error;

use crate::errors::Result;
use crate::tracking::{HitKind, ListingId};

/// Errors raised by pending queue implementations.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The backing store rejected a read.
    #[error("queue read failed: {0}")]
    ReadFailed(String),

    /// The backing store rejected a write.
    #[error("queue write failed: {0}")]
    WriteFailed(String),
}

/// Trait defining the contract for the pending queue store.
///
/// Implementations must be cheap and non-suspending on the producer path;
/// request handlers call [`merge`](PendingQueueTrait::merge) synchronously at
/// flush time. The contract is satisfied by any TTL-capable key/value store,
/// local or distributed.
pub trait PendingQueueTrait: Send + Sync {
    /// Returns the pending map for a kind. Absent or expired slots yield an
    /// empty map.
    fn get(&self, kind: HitKind) -> Result<HashMap<ListingId, u64>>;

    /// Additively merges `deltas` into the slot for `kind` and refreshes its
    /// TTL. Must be an atomic read-modify-write: concurrent merges against
    /// the same listing must never lose an increment.
    fn merge(&self, kind: HitKind, deltas: &HashMap<ListingId, u64>) -> Result<()>;

    /// Removes the slot for a kind entirely.
    fn delete(&self, kind: HitKind) -> Result<()>;

    /// Number of distinct listings pending for a kind.
    fn entry_count(&self, kind: HitKind) -> Result<usize>;
}
