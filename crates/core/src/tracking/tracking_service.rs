//! Tracking service wiring the write-behind engine together.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};
use tokio::sync::mpsc;

use super::accumulator::{HitAccumulator, TrackingScope};
use super::tracking_model::{
    DailyCount, HitKind, ListingId, ListingTotal, ListingTotals, ProcessSnapshot, QueueStats,
    TrackingConfig,
};
use super::tracking_traits::StatsRepositoryTrait;
use crate::errors::Result;
use crate::processor::{spawn_drain_worker, BatchProcessor, DrainLock, DrainOutcome, DrainReason};
use crate::queue::PendingQueueTrait;

/// Facade over the write-behind tracking engine.
///
/// Owns the pending queue, the batch processor and the trigger channel to
/// the background drain worker. Request handlers interact through
/// [`TrackingScope`]s; admin surfaces use the service directly.
pub struct TrackingService {
    queue: Arc<dyn PendingQueueTrait>,
    repository: Arc<dyn StatsRepositoryTrait>,
    processor: Arc<BatchProcessor>,
    trigger_tx: mpsc::UnboundedSender<DrainReason>,
    flush_threshold: usize,
}

impl TrackingService {
    /// Validates `config`, wires the processor and spawns the background
    /// drain worker. Must be called from within a Tokio runtime.
    ///
    /// The worker stops once the last handle to the service drops and the
    /// trigger channel closes, running one final drain pass on the way out.
    /// Processes that need the queue drained deterministically before exit
    /// should call [`force_process`](Self::force_process) instead of relying
    /// on that final pass.
    pub fn start(
        config: TrackingConfig,
        queue: Arc<dyn PendingQueueTrait>,
        repository: Arc<dyn StatsRepositoryTrait>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let lock = Arc::new(DrainLock::with_ttl(config.lock_ttl));
        let processor = Arc::new(BatchProcessor::new(
            queue.clone(),
            repository.clone(),
            lock,
            config.batch_size,
        ));
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        spawn_drain_worker(processor.clone(), trigger_rx, config.drain_interval);

        Ok(Arc::new(Self {
            queue,
            repository,
            processor,
            trigger_tx,
            flush_threshold: config.flush_threshold,
        }))
    }

    /// Opens a tracking scope bound to this service.
    pub fn scope(self: &Arc<Self>) -> TrackingScope {
        TrackingScope::new(self.clone())
    }

    /// Moves accumulated counts into the pending queue, then checks the
    /// flush threshold. Called by scopes on flush and on drop.
    pub(crate) fn flush_counts(&self, accumulator: &mut HitAccumulator) -> Result<()> {
        for kind in HitKind::ALL {
            let counts = accumulator.take(kind);
            if counts.is_empty() {
                continue;
            }
            if let Err(err) = self.queue.merge(kind, &counts) {
                // Keep the counts so a later flush retries them.
                accumulator.restore(kind, counts);
                return Err(err);
            }
        }
        self.check_threshold();
        Ok(())
    }

    /// Requests a drain when enough listings are pending. Never drains
    /// inline; the flushing request must not pay for the batch.
    fn check_threshold(&self) {
        let pending = match self.pending_entry_total() {
            Ok(count) => count,
            Err(err) => {
                warn!("Could not read pending entry counts: {}", err);
                return;
            }
        };
        if pending >= self.flush_threshold {
            debug!(
                "Pending entries ({}) reached flush threshold ({}), requesting drain",
                pending, self.flush_threshold
            );
            if self.trigger_tx.send(DrainReason::Threshold).is_err() {
                warn!("Drain worker is gone, threshold trigger dropped");
            }
        }
    }

    fn pending_entry_total(&self) -> Result<usize> {
        Ok(self.queue.entry_count(HitKind::Impression)?
            + self.queue.entry_count(HitKind::Click)?)
    }

    /// Runs one drain pass inline and reports queue statistics captured
    /// immediately before and after it. Safe to call on an empty queue.
    pub async fn force_process(&self) -> Result<ProcessSnapshot> {
        let before = self.get_stats()?;
        if self.processor.run_pass(DrainReason::Forced).await? == DrainOutcome::Skipped {
            debug!("Forced drain skipped, another pass is running");
        }
        let after = self.get_stats()?;
        Ok(ProcessSnapshot { before, after })
    }

    /// Point-in-time statistics of the pending queue.
    pub fn get_stats(&self) -> Result<QueueStats> {
        let impressions = self.queue.get(HitKind::Impression)?;
        let clicks = self.queue.get(HitKind::Click)?;

        let unique: HashSet<ListingId> =
            impressions.keys().chain(clicks.keys()).copied().collect();
        Ok(QueueStats {
            impressions_queued: impressions.values().sum(),
            clicks_queued: clicks.values().sum(),
            unique_pending_listings: unique.len(),
        })
    }

    /// All-time totals for one listing from the canonical store. Counts
    /// still in the pending queue are not included.
    pub fn get_running_totals(&self, listing_id: ListingId) -> Result<ListingTotals> {
        self.repository.get_running_totals(listing_id)
    }

    /// Per-day counts for a listing and kind, optionally bounded.
    pub fn get_daily_counts(
        &self,
        listing_id: ListingId,
        kind: HitKind,
        start_day: Option<NaiveDate>,
        end_day: Option<NaiveDate>,
    ) -> Result<Vec<DailyCount>> {
        self.repository
            .get_daily_counts(listing_id, kind, start_day, end_day)
    }

    /// Listings ranked by all-time total for a kind, highest first.
    pub fn get_top_listings(&self, kind: HitKind, limit: i64) -> Result<Vec<ListingTotal>> {
        self.repository.get_top_listings(kind, limit)
    }

    /// Removes every aggregate row for a listing, totals and daily buckets.
    pub async fn delete_listing_stats(&self, listing_id: ListingId) -> Result<()> {
        self.repository.delete_listing_stats(listing_id).await
    }
}
