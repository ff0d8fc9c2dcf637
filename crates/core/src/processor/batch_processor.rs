//! Batch processor draining the pending queue into the canonical store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{debug, error};

use crate::errors::Result;
use crate::queue::PendingQueueTrait;
use crate::tracking::{HitKind, ListingId, StatsRepositoryTrait, TrackingError};

use super::drain_lock::DrainLock;

/// What started a drain pass. Carried into log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    Threshold,
    Timer,
    Forced,
    Shutdown,
}

impl std::fmt::Display for DrainReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DrainReason::Threshold => "threshold",
            DrainReason::Timer => "timer",
            DrainReason::Forced => "forced",
            DrainReason::Shutdown => "shutdown",
        };
        write!(f, "{}", label)
    }
}

/// Entry totals for one completed drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Listings whose deltas were committed to the canonical store.
    pub applied_entries: usize,
    /// Listings whose commit failed; their deltas were dropped.
    pub failed_entries: usize,
    /// Listings left on the queue at the end of the pass, either batch
    /// overflow or deltas that arrived while the pass ran.
    pub remaining_entries: usize,
}

/// Result of attempting a drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainSummary),
    /// Another pass held the drain lock; nothing was read or written.
    Skipped,
}

/// Moves pending deltas from the queue into the canonical store in bounded
/// batches, one hit kind at a time.
pub struct BatchProcessor {
    queue: Arc<dyn PendingQueueTrait>,
    repository: Arc<dyn StatsRepositoryTrait>,
    lock: Arc<DrainLock>,
    batch_size: usize,
}

impl BatchProcessor {
    pub fn new(
        queue: Arc<dyn PendingQueueTrait>,
        repository: Arc<dyn StatsRepositoryTrait>,
        lock: Arc<DrainLock>,
        batch_size: usize,
    ) -> Self {
        Self {
            queue,
            repository,
            lock,
            batch_size,
        }
    }

    /// Runs one full drain pass, impressions first, then clicks.
    ///
    /// Skips immediately when another pass holds the drain lock. Store write
    /// failures are contained per listing; a queue read failure stops the
    /// pass with pending deltas left queued. The queue is re-read just
    /// before its committed slot is cleared, so flushes that land during
    /// the commit loop stay pending. Deltas are committed before they leave
    /// the queue, so a crash between the two steps can re-apply a batch
    /// once.
    pub async fn run_pass(&self, reason: DrainReason) -> Result<DrainOutcome> {
        let Some(_guard) = self.lock.try_acquire() else {
            debug!("Drain pass ({}) skipped, lock is held", reason);
            return Ok(DrainOutcome::Skipped);
        };

        let today = Utc::now().date_naive();
        let mut summary = DrainSummary::default();
        for kind in HitKind::ALL {
            self.drain_kind(kind, today, &mut summary).await?;
        }
        debug!(
            "Drain pass ({}) applied {} entries, {} failed, {} remaining",
            reason, summary.applied_entries, summary.failed_entries, summary.remaining_entries
        );
        Ok(DrainOutcome::Completed(summary))
    }

    async fn drain_kind(
        &self,
        kind: HitKind,
        today: NaiveDate,
        summary: &mut DrainSummary,
    ) -> Result<()> {
        let pending = self
            .queue
            .get(kind)
            .map_err(|e| TrackingError::QueueRead(e.to_string()))?;
        if pending.is_empty() {
            return Ok(());
        }

        let mut batch: Vec<(ListingId, u64)> = pending.into_iter().collect();
        batch.sort_unstable_by_key(|&(listing_id, _)| listing_id);
        batch.truncate(self.batch_size);

        for &(listing_id, delta) in &batch {
            match self.commit_entry(listing_id, kind, delta, today).await {
                Ok(()) => summary.applied_entries += 1,
                Err(err) => {
                    // This listing's delta is lost for the pass; totals
                    // self-heal as new hits arrive.
                    error!("{}", err);
                    summary.failed_entries += 1;
                }
            }
        }

        // Re-read right before the delete so deltas flushed while the
        // commit loop ran stay queued. Only a merge landing between this
        // read and the delete is lost.
        let mut leftover: HashMap<ListingId, u64> = self
            .queue
            .get(kind)
            .map_err(|e| TrackingError::QueueRead(e.to_string()))?;
        self.queue.delete(kind)?;

        // Batch deltas are consumed whether their commit succeeded or not;
        // what remains is the un-drained tail plus mid-pass flushes.
        for &(listing_id, delta) in &batch {
            if let Some(count) = leftover.get_mut(&listing_id) {
                *count = count.saturating_sub(delta);
            }
        }
        leftover.retain(|_, count| *count > 0);
        if !leftover.is_empty() {
            summary.remaining_entries += leftover.len();
            self.queue.merge(kind, &leftover)?;
        }
        Ok(())
    }

    async fn commit_entry(
        &self,
        listing_id: ListingId,
        kind: HitKind,
        delta: u64,
        today: NaiveDate,
    ) -> std::result::Result<(), TrackingError> {
        self.repository
            .increment_running_total(listing_id, kind, delta)
            .await
            .map_err(|e| TrackingError::StoreWrite {
                listing_id,
                kind,
                reason: e.to_string(),
            })?;
        self.repository
            .upsert_daily_bucket(listing_id, kind, today, delta)
            .await
            .map_err(|e| TrackingError::StoreWrite {
                listing_id,
                kind,
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatabaseError;
    use crate::queue::{MemoryPendingQueue, QueueError};
    use crate::tracking::{DailyCount, ListingTotal, ListingTotals};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct RecordingRepo {
        totals: Mutex<HashMap<(ListingId, HitKind), u64>>,
        buckets: Mutex<HashMap<(ListingId, HitKind, NaiveDate), u64>>,
        fail_listing: Option<ListingId>,
    }

    impl RecordingRepo {
        fn failing_for(listing_id: ListingId) -> Self {
            Self {
                fail_listing: Some(listing_id),
                ..Default::default()
            }
        }

        fn total(&self, listing_id: ListingId, kind: HitKind) -> u64 {
            *self
                .totals
                .lock()
                .unwrap()
                .get(&(listing_id, kind))
                .unwrap_or(&0)
        }

        fn bucket(&self, listing_id: ListingId, kind: HitKind, day: NaiveDate) -> u64 {
            *self
                .buckets
                .lock()
                .unwrap()
                .get(&(listing_id, kind, day))
                .unwrap_or(&0)
        }

        fn commit_count(&self) -> usize {
            self.totals.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl StatsRepositoryTrait for RecordingRepo {
        async fn increment_running_total(
            &self,
            listing_id: ListingId,
            kind: HitKind,
            delta: u64,
        ) -> Result<()> {
            if self.fail_listing == Some(listing_id) {
                return Err(DatabaseError::QueryFailed("injected failure".to_string()).into());
            }
            *self
                .totals
                .lock()
                .unwrap()
                .entry((listing_id, kind))
                .or_insert(0) += delta;
            Ok(())
        }

        async fn upsert_daily_bucket(
            &self,
            listing_id: ListingId,
            kind: HitKind,
            day: NaiveDate,
            delta: u64,
        ) -> Result<()> {
            *self
                .buckets
                .lock()
                .unwrap()
                .entry((listing_id, kind, day))
                .or_insert(0) += delta;
            Ok(())
        }

        fn get_running_totals(&self, _listing_id: ListingId) -> Result<ListingTotals> {
            unimplemented!()
        }

        fn get_daily_counts(
            &self,
            _listing_id: ListingId,
            _kind: HitKind,
            _start_day: Option<NaiveDate>,
            _end_day: Option<NaiveDate>,
        ) -> Result<Vec<DailyCount>> {
            unimplemented!()
        }

        fn get_top_listings(&self, _kind: HitKind, _limit: i64) -> Result<Vec<ListingTotal>> {
            unimplemented!()
        }

        async fn delete_listing_stats(&self, _listing_id: ListingId) -> Result<()> {
            unimplemented!()
        }
    }

    /// Repository whose first running-total write parks until released,
    /// holding the commit loop open for the test.
    struct GatedRepo {
        totals: Mutex<HashMap<(ListingId, HitKind), u64>>,
        entered: Semaphore,
        release: Semaphore,
        gate_armed: AtomicBool,
    }

    impl GatedRepo {
        fn new() -> Self {
            Self {
                totals: Mutex::new(HashMap::new()),
                entered: Semaphore::new(0),
                release: Semaphore::new(0),
                gate_armed: AtomicBool::new(true),
            }
        }

        fn total(&self, listing_id: ListingId, kind: HitKind) -> u64 {
            *self
                .totals
                .lock()
                .unwrap()
                .get(&(listing_id, kind))
                .unwrap_or(&0)
        }
    }

    #[async_trait]
    impl StatsRepositoryTrait for GatedRepo {
        async fn increment_running_total(
            &self,
            listing_id: ListingId,
            kind: HitKind,
            delta: u64,
        ) -> Result<()> {
            if self.gate_armed.swap(false, Ordering::SeqCst) {
                self.entered.add_permits(1);
                self.release.acquire().await.unwrap().forget();
            }
            *self
                .totals
                .lock()
                .unwrap()
                .entry((listing_id, kind))
                .or_insert(0) += delta;
            Ok(())
        }

        async fn upsert_daily_bucket(
            &self,
            _listing_id: ListingId,
            _kind: HitKind,
            _day: NaiveDate,
            _delta: u64,
        ) -> Result<()> {
            Ok(())
        }

        fn get_running_totals(&self, _listing_id: ListingId) -> Result<ListingTotals> {
            unimplemented!()
        }

        fn get_daily_counts(
            &self,
            _listing_id: ListingId,
            _kind: HitKind,
            _start_day: Option<NaiveDate>,
            _end_day: Option<NaiveDate>,
        ) -> Result<Vec<DailyCount>> {
            unimplemented!()
        }

        fn get_top_listings(&self, _kind: HitKind, _limit: i64) -> Result<Vec<ListingTotal>> {
            unimplemented!()
        }

        async fn delete_listing_stats(&self, _listing_id: ListingId) -> Result<()> {
            unimplemented!()
        }
    }

    struct FailingQueue;

    impl PendingQueueTrait for FailingQueue {
        fn get(&self, _kind: HitKind) -> Result<HashMap<ListingId, u64>> {
            Err(QueueError::ReadFailed("store offline".to_string()).into())
        }

        fn merge(&self, _kind: HitKind, _deltas: &HashMap<ListingId, u64>) -> Result<()> {
            unimplemented!()
        }

        fn delete(&self, _kind: HitKind) -> Result<()> {
            unimplemented!()
        }

        fn entry_count(&self, _kind: HitKind) -> Result<usize> {
            unimplemented!()
        }
    }

    fn seed(queue: &MemoryPendingQueue, kind: HitKind, pairs: &[(ListingId, u64)]) {
        let deltas: HashMap<ListingId, u64> = pairs.iter().copied().collect();
        queue.merge(kind, &deltas).unwrap();
    }

    #[tokio::test]
    async fn test_drain_commits_and_clears_queue() {
        let queue = Arc::new(MemoryPendingQueue::new());
        let repo = Arc::new(RecordingRepo::default());
        seed(&queue, HitKind::Impression, &[(1, 3), (2, 1)]);
        seed(&queue, HitKind::Click, &[(1, 2)]);

        let processor = BatchProcessor::new(
            queue.clone(),
            repo.clone(),
            Arc::new(DrainLock::new()),
            100,
        );
        let outcome = processor.run_pass(DrainReason::Timer).await.unwrap();

        let DrainOutcome::Completed(summary) = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.applied_entries, 3);
        assert_eq!(summary.failed_entries, 0);
        assert_eq!(summary.remaining_entries, 0);

        assert_eq!(repo.total(1, HitKind::Impression), 3);
        assert_eq!(repo.total(2, HitKind::Impression), 1);
        assert_eq!(repo.total(1, HitKind::Click), 2);

        let today = Utc::now().date_naive();
        assert_eq!(repo.bucket(1, HitKind::Impression, today), 3);
        assert_eq!(repo.bucket(1, HitKind::Click, today), 2);

        assert!(queue.get(HitKind::Impression).unwrap().is_empty());
        assert!(queue.get(HitKind::Click).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_bounds_pass_and_keeps_remainder() {
        let queue = Arc::new(MemoryPendingQueue::new());
        let repo = Arc::new(RecordingRepo::default());
        let pairs: Vec<(ListingId, u64)> = (1..=150).map(|id| (id, 1)).collect();
        seed(&queue, HitKind::Impression, &pairs);

        let processor = BatchProcessor::new(
            queue.clone(),
            repo.clone(),
            Arc::new(DrainLock::new()),
            100,
        );
        let outcome = processor.run_pass(DrainReason::Timer).await.unwrap();

        let DrainOutcome::Completed(summary) = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.applied_entries, 100);
        assert_eq!(summary.remaining_entries, 50);
        assert_eq!(repo.commit_count(), 100);

        // Lowest listing ids drain first; the tail stays queued.
        let remaining = queue.get(HitKind::Impression).unwrap();
        assert_eq!(remaining.len(), 50);
        assert!(remaining.keys().all(|&id| id > 100));
        assert_eq!(repo.total(100, HitKind::Impression), 1);
        assert_eq!(repo.total(101, HitKind::Impression), 0);
    }

    #[tokio::test]
    async fn test_pass_skips_while_lock_is_held() {
        let queue = Arc::new(MemoryPendingQueue::new());
        let repo = Arc::new(RecordingRepo::default());
        seed(&queue, HitKind::Impression, &[(1, 1)]);

        let lock = Arc::new(DrainLock::new());
        let processor = BatchProcessor::new(queue.clone(), repo.clone(), lock.clone(), 100);

        let _held = lock.try_acquire().unwrap();
        let outcome = processor.run_pass(DrainReason::Threshold).await.unwrap();

        assert_eq!(outcome, DrainOutcome::Skipped);
        assert_eq!(repo.commit_count(), 0);
        assert_eq!(queue.entry_count(HitKind::Impression).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_queue_read_failure_aborts_pass() {
        let repo = Arc::new(RecordingRepo::default());
        let processor = BatchProcessor::new(
            Arc::new(FailingQueue),
            repo.clone(),
            Arc::new(DrainLock::new()),
            100,
        );

        let result = processor.run_pass(DrainReason::Timer).await;

        assert!(result.is_err());
        assert_eq!(repo.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_store_write_failure_only_loses_that_listing() {
        let queue = Arc::new(MemoryPendingQueue::new());
        let repo = Arc::new(RecordingRepo::failing_for(2));
        seed(&queue, HitKind::Impression, &[(1, 5), (2, 7), (3, 9)]);

        let processor = BatchProcessor::new(
            queue.clone(),
            repo.clone(),
            Arc::new(DrainLock::new()),
            100,
        );
        let outcome = processor.run_pass(DrainReason::Forced).await.unwrap();

        let DrainOutcome::Completed(summary) = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.applied_entries, 2);
        assert_eq!(summary.failed_entries, 1);

        assert_eq!(repo.total(1, HitKind::Impression), 5);
        assert_eq!(repo.total(2, HitKind::Impression), 0);
        assert_eq!(repo.total(3, HitKind::Impression), 9);

        // The failed delta does not linger in the queue.
        assert!(queue.get(HitKind::Impression).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_during_commit_loop_stays_queued() {
        let queue = Arc::new(MemoryPendingQueue::new());
        let repo = Arc::new(GatedRepo::new());
        seed(&queue, HitKind::Impression, &[(1, 5)]);

        let processor = Arc::new(BatchProcessor::new(
            queue.clone(),
            repo.clone(),
            Arc::new(DrainLock::new()),
            100,
        ));

        let pass = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_pass(DrainReason::Threshold).await }
        });

        // Hold the pass inside its first canonical write, then flush a new
        // delta into the queue before letting it finish.
        repo.entered.acquire().await.unwrap().forget();
        seed(&queue, HitKind::Impression, &[(2, 3)]);
        repo.release.add_permits(1);

        let outcome = pass.await.unwrap().unwrap();
        let DrainOutcome::Completed(summary) = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(summary.applied_entries, 1);
        assert_eq!(summary.remaining_entries, 1);
        assert_eq!(repo.total(1, HitKind::Impression), 5);

        // The mid-pass flush survives the slot clear.
        let pending = queue.get(HitKind::Impression).unwrap();
        assert_eq!(pending.get(&2), Some(&3));

        processor.run_pass(DrainReason::Timer).await.unwrap();
        assert_eq!(repo.total(2, HitKind::Impression), 3);
        assert!(queue.get(HitKind::Impression).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_released_after_pass() {
        let queue = Arc::new(MemoryPendingQueue::new());
        let repo = Arc::new(RecordingRepo::default());
        seed(&queue, HitKind::Click, &[(9, 1)]);

        let lock = Arc::new(DrainLock::new());
        let processor = BatchProcessor::new(queue, repo, lock.clone(), 100);

        processor.run_pass(DrainReason::Timer).await.unwrap();
        assert!(!lock.is_held());

        // A second pass on an empty queue completes with nothing to do.
        let outcome = processor.run_pass(DrainReason::Timer).await.unwrap();
        assert_eq!(
            outcome,
            DrainOutcome::Completed(DrainSummary::default())
        );
    }
}
