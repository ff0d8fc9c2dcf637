//! Pending queue module - the shared buffer between flush and drain.

mod memory_store;
mod queue_traits;

// Re-export the public interface
pub use memory_store::MemoryPendingQueue;
pub use queue_traits::{PendingQueueTrait, QueueError};
