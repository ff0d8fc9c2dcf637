//! Tracking module - accumulator, service facade, and trait seams.

mod accumulator;
mod tracking_errors;
mod tracking_model;
mod tracking_service;
mod tracking_traits;

// Re-export the public interface
pub use accumulator::{HitAccumulator, TrackingScope};
pub use tracking_errors::{ConfigError, TrackingError};
pub use tracking_model::{
    DailyCount, HitKind, ListingId, ListingTotal, ListingTotals, ProcessSnapshot, QueueStats,
    TrackingConfig,
};
pub use tracking_service::TrackingService;
pub use tracking_traits::StatsRepositoryTrait;
