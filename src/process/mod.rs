/*!
 * Process Module
 * Tasks: OS threads with priorities, cooperative cancellation and restart
 */

pub mod context;
pub mod manager;
pub mod priority;
pub mod task;
pub mod types;

// Re-export for convenience
pub use context::TaskContext;
pub use manager::TaskManager;
pub use priority::{current_priority, set_current_priority};
pub use task::{get_priority, set_priority, thread_id, Task, TaskEntry};
pub use types::{SchedPolicy, TaskAttributes, TaskConfig, TaskEvent, TaskState};
