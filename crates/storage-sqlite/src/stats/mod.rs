//! SQLite storage implementation for listing statistics.

mod model;
mod repository;

pub use model::{ListingDailyStatDB, ListingStatDB};
pub use repository::StatsRepository;

// Re-export trait from core for convenience
pub use listrack_core::tracking::StatsRepositoryTrait;
