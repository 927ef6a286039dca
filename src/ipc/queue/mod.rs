/*!
 * Queue Module
 * Pooled, priority-aware message queues
 */

mod engine;
pub mod list;
mod pool;
pub mod types;

// Re-export public API
pub use engine::MessageQueue;
pub use list::SlotList;
pub use types::{slot_size, MessagePriority, QueueStats, SLOT_HEADER_SIZE};
