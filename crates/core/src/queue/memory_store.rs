//! In-process pending queue backed by mutex-guarded maps.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

use crate::constants::DEFAULT_QUEUE_TTL_SECS;
use crate::errors::Result;
use crate::tracking::{HitKind, ListingId};

use super::queue_traits::PendingQueueTrait;

/// One pending slot: accumulated deltas plus an absolute expiry deadline.
#[derive(Debug)]
struct PendingSlot {
    deltas: HashMap<ListingId, u64>,
    expires_at: Instant,
}

/// In-memory [`PendingQueueTrait`] implementation.
///
/// Each hit kind owns an independent slot so impression flushes never
/// contend with click flushes. Slots expire `ttl` after the most recent
/// merge; an expired slot reads as empty and is dropped lazily on the next
/// access.
pub struct MemoryPendingQueue {
    impressions: Mutex<Option<PendingSlot>>,
    clicks: Mutex<Option<PendingSlot>>,
    ttl: Duration,
}

impl MemoryPendingQueue {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_QUEUE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            impressions: Mutex::new(None),
            clicks: Mutex::new(None),
            ttl,
        }
    }

    /// Locks the slot for a kind, recovering from a poisoned mutex by taking
    /// the inner state as-is.
    fn lock_slot(&self, kind: HitKind) -> MutexGuard<'_, Option<PendingSlot>> {
        let slot = match kind {
            HitKind::Impression => &self.impressions,
            HitKind::Click => &self.clicks,
        };
        match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Pending queue mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for MemoryPendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingQueueTrait for MemoryPendingQueue {
    fn get(&self, kind: HitKind) -> Result<HashMap<ListingId, u64>> {
        let guard = self.lock_slot(kind);
        match guard.as_ref() {
            Some(slot) if slot.expires_at > Instant::now() => Ok(slot.deltas.clone()),
            _ => Ok(HashMap::new()),
        }
    }

    fn merge(&self, kind: HitKind, deltas: &HashMap<ListingId, u64>) -> Result<()> {
        if deltas.is_empty() {
            return Ok(());
        }
        let now = Instant::now();
        let mut guard = self.lock_slot(kind);

        // Expired contents must not resurrect into the refreshed slot.
        if guard.as_ref().is_some_and(|slot| slot.expires_at <= now) {
            *guard = None;
        }

        let slot = guard.get_or_insert_with(|| PendingSlot {
            deltas: HashMap::new(),
            expires_at: now + self.ttl,
        });
        for (&listing_id, &delta) in deltas {
            *slot.deltas.entry(listing_id).or_insert(0) += delta;
        }
        slot.expires_at = now + self.ttl;
        Ok(())
    }

    fn delete(&self, kind: HitKind) -> Result<()> {
        let mut guard = self.lock_slot(kind);
        *guard = None;
        Ok(())
    }

    fn entry_count(&self, kind: HitKind) -> Result<usize> {
        let guard = self.lock_slot(kind);
        match guard.as_ref() {
            Some(slot) if slot.expires_at > Instant::now() => Ok(slot.deltas.len()),
            _ => Ok(0),
        }
    }
}
