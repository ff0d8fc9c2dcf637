/// Pending entries across both hit kinds that trigger an early drain
pub const DEFAULT_FLUSH_THRESHOLD: usize = 50;

/// Maximum listings committed per kind in a single drain pass
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Seconds before a drain lock holder self-expires
pub const DEFAULT_LOCK_TTL_SECS: u64 = 60;

/// Seconds a pending-queue slot lives without a refreshing merge
pub const DEFAULT_QUEUE_TTL_SECS: u64 = 300;

/// Seconds between timer-driven drain passes
pub const DEFAULT_DRAIN_INTERVAL_SECS: u64 = 60;
