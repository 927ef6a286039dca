/*!
 * Core Module
 * Fundamental types, error handling and synchronization
 */

pub mod errors;
pub mod id;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use id::{PeerId, TaskId};
pub use sync::{delay, Deadline, Event, Mutex, MutexGuard, Semaphore, Timeout};
pub use types::*;
