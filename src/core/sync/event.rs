/*!
 * Event
 *
 * Auto-reset wakeup flag: a set event satisfies exactly one `wait`, which
 * clears the flag as it returns.
 */

use super::timeout::Timeout;
use super::wait::{wait_until, Condition, WaitStatus};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::types::Outcome;
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct EventState {
    set: bool,
    alive: bool,
}

/// Single-shot wakeup flag
///
/// Share between tasks with `Arc<Event>`.
#[derive(Debug)]
pub struct Event {
    state: Mutex<EventState>,
    cond: Condvar,
}

impl Event {
    /// New event, initially clear
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EventState {
                set: false,
                alive: true,
            }),
            cond: Condvar::new(),
        }
    }

    /// Wait for the flag and clear it
    ///
    /// `Ready` when this caller consumed a `set`, `Pending` on timeout.
    pub fn wait(&self, timeout: Timeout) -> OsaResult<Outcome<()>> {
        let deadline = timeout.deadline();
        let mut state = self.state.lock();
        let status = wait_until(&self.cond, &mut state, deadline, |s| {
            if !s.alive {
                Condition::Gone
            } else if s.set {
                s.set = false;
                Condition::Ready
            } else {
                Condition::Blocked
            }
        });

        match status {
            WaitStatus::Ready => Ok(Outcome::Ready(())),
            WaitStatus::TimedOut => Ok(Outcome::Pending),
            WaitStatus::Gone => Err(dead()),
        }
    }

    /// Raise the flag and wake one waiter
    pub fn set(&self) -> OsaResult<()> {
        let mut state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        state.set = true;
        self.cond.notify_one();
        Ok(())
    }

    /// Drop the flag regardless of waiters
    pub fn clear(&self) -> OsaResult<()> {
        let mut state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        state.set = false;
        Ok(())
    }

    pub fn is_set(&self) -> OsaResult<bool> {
        let state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        Ok(state.set)
    }

    /// Invalidate the event; blocked waiters return `InvalidHandle`
    pub fn delete(&self) -> OsaResult<()> {
        let mut state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        state.alive = false;
        self.cond.notify_all();
        tracing::trace!("event deleted");
        Ok(())
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

fn dead() -> OsaError {
    OsaError::invalid_handle(ModuleId::Osa, "event deleted")
}
