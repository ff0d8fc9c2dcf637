//! SQLite storage implementation for Listrack.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository traits defined in `listrack-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The canonical statistics store (running totals and per-day buckets)
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place where Diesel dependencies exist. The core
//! engine is database-agnostic and works with traits.
//!
//! ```text
//!        core (engine)
//!              │
//!              ▼
//!   storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;

// Repository implementations
pub mod stats;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, get_db_path, init, run_migrations, spawn_writer, DbConnection,
    DbPool, WriteHandle,
};

// Re-export storage errors
pub use errors::StorageError;

// Re-export from listrack-core for convenience
pub use listrack_core::errors::{DatabaseError, Error, Result};
