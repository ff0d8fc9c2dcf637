//! TTL-expiring drain lock.
//!
//! Ensures at most one drain pass runs at a time. The lock never blocks:
//! callers try to acquire and skip their pass on contention. A TTL bounds
//! how long a crashed or wedged holder can keep the lock; once the deadline
//! passes the next acquirer evicts the stale holder and proceeds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

use crate::constants::DEFAULT_LOCK_TTL_SECS;

#[derive(Debug)]
struct Holder {
    token: u64,
    acquired_at: Instant,
}

/// Mutual exclusion guard for drain passes.
pub struct DrainLock {
    holder: Mutex<Option<Holder>>,
    next_token: AtomicU64,
    ttl: Duration,
}

impl DrainLock {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_LOCK_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            holder: Mutex::new(None),
            next_token: AtomicU64::new(1),
            ttl,
        }
    }

    fn lock_holder(&self) -> MutexGuard<'_, Option<Holder>> {
        match self.holder.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Drain lock mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Attempts to take the lock. Returns `None` when another holder is
    /// still live; a holder past its TTL is evicted and replaced.
    pub fn try_acquire(self: &Arc<Self>) -> Option<DrainGuard> {
        let mut guard = self.lock_holder();
        if let Some(holder) = guard.as_ref() {
            if holder.acquired_at.elapsed() < self.ttl {
                return None;
            }
            warn!(
                "Evicting expired drain lock holder (held for {:?})",
                holder.acquired_at.elapsed()
            );
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        *guard = Some(Holder {
            token,
            acquired_at: Instant::now(),
        });
        Some(DrainGuard {
            lock: Arc::clone(self),
            token,
        })
    }

    pub fn is_held(&self) -> bool {
        let guard = self.lock_holder();
        guard
            .as_ref()
            .is_some_and(|holder| holder.acquired_at.elapsed() < self.ttl)
    }

    fn release(&self, token: u64) {
        let mut guard = self.lock_holder();
        // Only the current holder may release; a stale guard whose slot was
        // evicted must not free the lock out from under the new holder.
        if guard.as_ref().is_some_and(|holder| holder.token == token) {
            *guard = None;
        }
    }
}

impl Default for DrainLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope guard returned by [`DrainLock::try_acquire`]. Releases the lock on
/// drop, which covers every exit path out of a drain pass including panics
/// and early returns.
pub struct DrainGuard {
    lock: Arc<DrainLock>,
    token: u64,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.lock.release(self.token);
    }
}
