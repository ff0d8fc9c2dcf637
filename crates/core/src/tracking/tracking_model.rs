//! Tracking domain models.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::tracking_errors::ConfigError;
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_DRAIN_INTERVAL_SECS, DEFAULT_FLUSH_THRESHOLD,
    DEFAULT_LOCK_TTL_SECS, DEFAULT_QUEUE_TTL_SECS,
};
use crate::errors::Result;

/// Identifier of a tracked listing.
pub type ListingId = i64;

/// Kind of hit recorded against a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    /// Listing appeared in a search result or category page.
    Impression,
    /// Listing detail page was opened.
    Click,
}

impl HitKind {
    /// Both kinds, in drain order.
    pub const ALL: [HitKind; 2] = [HitKind::Impression, HitKind::Click];

    /// Canonical tag used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            HitKind::Impression => "impression",
            HitKind::Click => "click",
        }
    }

    /// Parses a canonical tag back into a kind.
    pub fn from_tag(tag: &str) -> Option<HitKind> {
        match tag {
            "impression" => Some(HitKind::Impression),
            "click" => Some(HitKind::Click),
            _ => None,
        }
    }
}

impl std::fmt::Display for HitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engine configuration.
///
/// Invalid values are rejected once by [`validate`](TrackingConfig::validate)
/// when the engine starts, not per increment.
#[derive(Clone, Debug)]
pub struct TrackingConfig {
    /// Pending entries across both kinds that trigger an early drain.
    pub flush_threshold: usize,
    /// Maximum listings committed per kind in one drain pass.
    pub batch_size: usize,
    /// Interval of the timer-driven drain.
    pub drain_interval: Duration,
    /// Drain lock lifetime before a wedged holder self-expires.
    pub lock_ttl: Duration,
    /// Pending-queue slot lifetime; refreshed on every merge.
    pub queue_ttl: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            drain_interval: Duration::from_secs(DEFAULT_DRAIN_INTERVAL_SECS),
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            queue_ttl: Duration::from_secs(DEFAULT_QUEUE_TTL_SECS),
        }
    }
}

impl TrackingConfig {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "flush_threshold must be greater than zero".to_string(),
            )
            .into());
        }
        if self.batch_size == 0 {
            return Err(
                ConfigError::InvalidValue("batch_size must be greater than zero".to_string())
                    .into(),
            );
        }
        if self.drain_interval.is_zero() {
            return Err(
                ConfigError::InvalidValue("drain_interval must be non-zero".to_string()).into(),
            );
        }
        if self.lock_ttl.is_zero() {
            return Err(ConfigError::InvalidValue("lock_ttl must be non-zero".to_string()).into());
        }
        if self.queue_ttl.is_zero() {
            return Err(ConfigError::InvalidValue("queue_ttl must be non-zero".to_string()).into());
        }
        Ok(())
    }
}

/// Pending-queue statistics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Sum of queued impression counts across all listings.
    pub impressions_queued: u64,
    /// Sum of queued click counts across all listings.
    pub clicks_queued: u64,
    /// Distinct listings with at least one pending count of either kind.
    pub unique_pending_listings: usize,
}

/// Queue statistics captured immediately before and after a forced drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub before: QueueStats,
    pub after: QueueStats,
}

/// All-time running totals for a single listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingTotals {
    pub listing_id: ListingId,
    pub impressions: u64,
    pub clicks: u64,
}

/// One per-day bucket for a single listing and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: u64,
}

/// A listing and its all-time total for one kind, used in rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingTotal {
    pub listing_id: ListingId,
    pub total: u64,
}
