//! Request-scoped hit accumulation.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use log::error;

use super::tracking_model::{HitKind, ListingId, ProcessSnapshot};
use super::tracking_service::TrackingService;
use crate::errors::Result;

/// In-memory counts collected during one request or unit of work.
#[derive(Debug, Default)]
pub struct HitAccumulator {
    impressions: HashMap<ListingId, u64>,
    clicks: HashMap<ListingId, u64>,
}

impl HitAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn counts_mut(&mut self, kind: HitKind) -> &mut HashMap<ListingId, u64> {
        match kind {
            HitKind::Impression => &mut self.impressions,
            HitKind::Click => &mut self.clicks,
        }
    }

    /// Records one hit. A plain map update, no lock and no I/O.
    pub fn increment(&mut self, listing_id: ListingId, kind: HitKind) {
        *self.counts_mut(kind).entry(listing_id).or_insert(0) += 1;
    }

    pub fn counts(&self, kind: HitKind) -> &HashMap<ListingId, u64> {
        match kind {
            HitKind::Impression => &self.impressions,
            HitKind::Click => &self.clicks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.impressions.is_empty() && self.clicks.is_empty()
    }

    /// Takes the counts for one kind, leaving that kind empty.
    pub fn take(&mut self, kind: HitKind) -> HashMap<ListingId, u64> {
        mem::take(self.counts_mut(kind))
    }

    /// Puts counts back after a failed flush so the next flush retries them.
    pub fn restore(&mut self, kind: HitKind, counts: HashMap<ListingId, u64>) {
        let target = self.counts_mut(kind);
        for (listing_id, delta) in counts {
            *target.entry(listing_id).or_insert(0) += delta;
        }
    }
}

/// Tracking handle scoped to one request or unit of work.
///
/// Obtained from [`TrackingService::scope`]. Collected counts move to the
/// pending queue when the scope flushes, at the latest when it drops, so a
/// handler can record hits and return without touching shared state.
pub struct TrackingScope {
    service: Arc<TrackingService>,
    accumulator: HitAccumulator,
}

impl TrackingScope {
    pub(crate) fn new(service: Arc<TrackingService>) -> Self {
        Self {
            service,
            accumulator: HitAccumulator::new(),
        }
    }

    /// Records one impression for a listing.
    pub fn increment_impression(&mut self, listing_id: ListingId) {
        self.accumulator.increment(listing_id, HitKind::Impression);
    }

    /// Records one click for a listing.
    pub fn increment_click(&mut self, listing_id: ListingId) {
        self.accumulator.increment(listing_id, HitKind::Click);
    }

    /// Moves the collected counts into the pending queue.
    pub fn flush(&mut self) -> Result<()> {
        self.service.flush_counts(&mut self.accumulator)
    }

    /// Flushes this scope, then runs one drain pass inline.
    pub async fn force_process(&mut self) -> Result<ProcessSnapshot> {
        self.flush()?;
        self.service.force_process().await
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        if self.accumulator.is_empty() {
            return;
        }
        if let Err(err) = self.service.flush_counts(&mut self.accumulator) {
            error!("Failed to flush hit counts on scope drop: {}", err);
        }
    }
}
