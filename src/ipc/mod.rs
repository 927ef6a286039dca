/*!
 * IPC Module
 * Inter-task communication: pooled message queues and byte FIFOs
 */

pub mod fifo;
pub mod queue;

// Re-export for convenience
pub use fifo::ByteFifo;
pub use queue::{MessagePriority, MessageQueue, QueueStats};
