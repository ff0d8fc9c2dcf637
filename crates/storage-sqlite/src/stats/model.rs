//! Database models for listing statistics.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use listrack_core::tracking::{DailyCount, ListingTotal};

/// Database model for all-time totals, one row per listing and kind.
#[derive(
    Queryable, Identifiable, Insertable, Selectable, PartialEq, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::listing_stats)]
#[diesel(primary_key(listing_id, kind))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ListingStatDB {
    pub listing_id: i64,
    pub kind: String,
    pub total: i64,
    pub updated_at: NaiveDateTime,
}

impl From<ListingStatDB> for ListingTotal {
    fn from(db: ListingStatDB) -> Self {
        Self {
            listing_id: db.listing_id,
            total: db.total.max(0) as u64,
        }
    }
}

/// Database model for per-day buckets, one row per listing, kind and day.
#[derive(
    Queryable, Identifiable, Insertable, Selectable, PartialEq, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::listing_daily_stats)]
#[diesel(primary_key(listing_id, kind, day))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ListingDailyStatDB {
    pub listing_id: i64,
    pub kind: String,
    pub day: NaiveDate,
    pub count: i64,
}

impl From<ListingDailyStatDB> for DailyCount {
    fn from(db: ListingDailyStatDB) -> Self {
        Self {
            day: db.day,
            count: db.count.max(0) as u64,
        }
    }
}
