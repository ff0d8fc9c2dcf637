use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use log::warn;
use std::sync::Arc;

use super::model::{ListingDailyStatDB, ListingStatDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{listing_daily_stats, listing_stats};
use listrack_core::errors::Result;
use listrack_core::tracking::{
    DailyCount, HitKind, ListingId, ListingTotal, ListingTotals, StatsRepositoryTrait,
};

/// Canonical statistics store backed by SQLite.
///
/// Writes go through the single-writer actor; reads use pooled connections
/// directly.
pub struct StatsRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl StatsRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl StatsRepositoryTrait for StatsRepository {
    async fn increment_running_total(
        &self,
        input_listing_id: ListingId,
        kind: HitKind,
        delta: u64,
    ) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let delta = i64::try_from(delta).unwrap_or(i64::MAX);
        let kind_tag = kind.as_str();

        self.writer
            .exec(move |conn| {
                let row = ListingStatDB {
                    listing_id: input_listing_id,
                    kind: kind_tag.to_string(),
                    total: delta,
                    updated_at: Utc::now().naive_utc(),
                };
                diesel::insert_into(listing_stats::table)
                    .values(&row)
                    .on_conflict((listing_stats::listing_id, listing_stats::kind))
                    .do_update()
                    .set((
                        listing_stats::total.eq(listing_stats::total + delta),
                        listing_stats::updated_at.eq(row.updated_at),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn upsert_daily_bucket(
        &self,
        input_listing_id: ListingId,
        kind: HitKind,
        day: NaiveDate,
        delta: u64,
    ) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let delta = i64::try_from(delta).unwrap_or(i64::MAX);
        let kind_tag = kind.as_str();

        self.writer
            .exec(move |conn| {
                let row = ListingDailyStatDB {
                    listing_id: input_listing_id,
                    kind: kind_tag.to_string(),
                    day,
                    count: delta,
                };
                diesel::insert_into(listing_daily_stats::table)
                    .values(&row)
                    .on_conflict((
                        listing_daily_stats::listing_id,
                        listing_daily_stats::kind,
                        listing_daily_stats::day,
                    ))
                    .do_update()
                    .set(listing_daily_stats::count.eq(listing_daily_stats::count + delta))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn get_running_totals(&self, input_listing_id: ListingId) -> Result<ListingTotals> {
        let mut conn = get_connection(&self.pool)?;

        let rows = listing_stats::table
            .filter(listing_stats::listing_id.eq(input_listing_id))
            .load::<ListingStatDB>(&mut conn)
            .map_err(StorageError::from)?;

        // Missing rows read as zero; a listing with no hits has no rows.
        let mut totals = ListingTotals {
            listing_id: input_listing_id,
            impressions: 0,
            clicks: 0,
        };
        for row in rows {
            match HitKind::from_tag(&row.kind) {
                Some(HitKind::Impression) => totals.impressions = row.total.max(0) as u64,
                Some(HitKind::Click) => totals.clicks = row.total.max(0) as u64,
                None => warn!(
                    "Ignoring unknown hit kind '{}' for listing {}",
                    row.kind, row.listing_id
                ),
            }
        }
        Ok(totals)
    }

    fn get_daily_counts(
        &self,
        input_listing_id: ListingId,
        kind: HitKind,
        start_day: Option<NaiveDate>,
        end_day: Option<NaiveDate>,
    ) -> Result<Vec<DailyCount>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = listing_daily_stats::table
            .filter(listing_daily_stats::listing_id.eq(input_listing_id))
            .filter(listing_daily_stats::kind.eq(kind.as_str()))
            .order(listing_daily_stats::day.asc())
            .into_boxed();

        if let Some(start) = start_day {
            query = query.filter(listing_daily_stats::day.ge(start));
        }
        if let Some(end) = end_day {
            query = query.filter(listing_daily_stats::day.le(end));
        }

        let rows = query
            .load::<ListingDailyStatDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(DailyCount::from).collect())
    }

    fn get_top_listings(&self, kind: HitKind, input_limit: i64) -> Result<Vec<ListingTotal>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = listing_stats::table
            .filter(listing_stats::kind.eq(kind.as_str()))
            .order((
                listing_stats::total.desc(),
                listing_stats::listing_id.asc(),
            ))
            .limit(input_limit.max(0))
            .load::<ListingStatDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(ListingTotal::from).collect())
    }

    async fn delete_listing_stats(&self, input_listing_id: ListingId) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    listing_stats::table.filter(listing_stats::listing_id.eq(input_listing_id)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                diesel::delete(
                    listing_daily_stats::table
                        .filter(listing_daily_stats::listing_id.eq(input_listing_id)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
