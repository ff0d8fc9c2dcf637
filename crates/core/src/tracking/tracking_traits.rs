//! Canonical store trait.
//!
//! This trait defines the contract for the aggregate store without any
//! database-specific types, allowing for different storage implementations.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::tracking_model::{DailyCount, HitKind, ListingId, ListingTotal, ListingTotals};
use crate::errors::Result;

/// Trait defining the contract for the canonical aggregate store.
///
/// The batch processor commits drained deltas through the two write
/// operations; the read operations back admin surfaces. Writes are additive
/// and must be applied exactly once per drained delta, which is why the
/// processor removes a delta from the pending queue in the same logical step
/// it commits it.
#[async_trait]
pub trait StatsRepositoryTrait: Send + Sync {
    /// Adds `delta` to the all-time running total for `(listing_id, kind)`,
    /// creating the row if absent.
    async fn increment_running_total(
        &self,
        listing_id: ListingId,
        kind: HitKind,
        delta: u64,
    ) -> Result<()>;

    /// Adds `delta` into the per-day bucket for `(listing_id, kind, day)`,
    /// creating the bucket if absent.
    async fn upsert_daily_bucket(
        &self,
        listing_id: ListingId,
        kind: HitKind,
        day: NaiveDate,
        delta: u64,
    ) -> Result<()>;

    /// All-time totals for one listing, both kinds. Absent rows read as zero.
    fn get_running_totals(&self, listing_id: ListingId) -> Result<ListingTotals>;

    /// Per-day counts for a listing and kind, ascending by day, optionally
    /// bounded on either side.
    fn get_daily_counts(
        &self,
        listing_id: ListingId,
        kind: HitKind,
        start_day: Option<NaiveDate>,
        end_day: Option<NaiveDate>,
    ) -> Result<Vec<DailyCount>>;

    /// Listings ranked by all-time total for a kind, highest first.
    fn get_top_listings(&self, kind: HitKind, limit: i64) -> Result<Vec<ListingTotal>>;

    /// Removes all aggregate rows for a listing, totals and daily buckets.
    async fn delete_listing_stats(&self, listing_id: ListingId) -> Result<()>;
}
