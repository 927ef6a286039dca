/*!
 * OSA Kernel Library
 * Operating-system adapter: synchronization, message queues, tasks and TCP transport
 */

pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod net;
pub mod process;

// Re-exports
pub use crate::core::errors::*;
pub use crate::core::id::{PeerId, TaskId};
pub use crate::core::sync::{delay, Deadline, Event, Mutex, MutexGuard, Semaphore, Timeout};
pub use crate::core::types::{Outcome, Priority, Size};
pub use ipc::{ByteFifo, MessagePriority, MessageQueue, QueueStats};
pub use monitoring::{init_tracing, LogSink, RecordingSink, SharedSink, TracingSink};
pub use net::{
    ComMode, ComProtocol, Connection, Endpoint, NetConfig, Server, ServerAttributes,
};
pub use process::{
    SchedPolicy, Task, TaskAttributes, TaskConfig, TaskContext, TaskEvent, TaskManager, TaskState,
};
