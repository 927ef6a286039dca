/*!
 * Synchronization Primitives
 *
 * Event, Mutex and Semaphore, each a `parking_lot` lock over its own state plus
 * a condition variable, all speaking the same [`Timeout`] contract:
 *
 * - `Ok(Outcome::Ready(..))`: acquired / signalled
 * - `Ok(Outcome::Pending)`: deadline passed without progress
 * - `Err(..)`: misuse or a deleted object
 *
 * No primitive ever takes another primitive's lock. On a task thread every
 * blocking wait is also a cancellation point (see [`cancel`]).
 */

pub(crate) mod cancel;
mod event;
mod mutex;
mod semaphore;
mod timeout;
pub(crate) mod wait;

pub use event::Event;
pub use mutex::{Mutex, MutexGuard};
pub use semaphore::Semaphore;
pub use timeout::{delay, Deadline, Timeout};
