pub mod batch_processor;
pub mod drain_lock;
pub mod worker;

pub use batch_processor::{BatchProcessor, DrainOutcome, DrainReason, DrainSummary};
pub use drain_lock::{DrainGuard, DrainLock};
pub use worker::spawn_drain_worker;
