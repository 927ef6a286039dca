/*!
 * Semaphore
 *
 * Counting resource guard. The count is the number of outstanding units and
 * is only ever decremented by a successful `wait`, so it is never negative and
 * a timed-out wait leaves it untouched.
 */

use super::timeout::Timeout;
use super::wait::{wait_until, Condition, WaitStatus};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::types::Outcome;
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct SemState {
    count: u32,
    alive: bool,
}

/// Counting semaphore
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<SemState>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            state: Mutex::new(SemState {
                count: initial,
                alive: true,
            }),
            cond: Condvar::new(),
        }
    }

    /// Take one unit, blocking per `timeout` while the count is zero
    pub fn wait(&self, timeout: Timeout) -> OsaResult<Outcome<()>> {
        let deadline = timeout.deadline();
        let mut state = self.state.lock();
        let status = wait_until(&self.cond, &mut state, deadline, |s| {
            if !s.alive {
                Condition::Gone
            } else if s.count > 0 {
                s.count -= 1;
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

    /// Return one unit and wake one waiter
    pub fn post(&self) -> OsaResult<()> {
        let mut state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        state.count = state
            .count
            .checked_add(1)
            .ok_or_else(|| OsaError::out_of_range(ModuleId::Osa, "semaphore count overflow"))?;
        self.cond.notify_one();
        Ok(())
    }

    /// Snapshot of outstanding units
    pub fn count(&self) -> OsaResult<u32> {
        let state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        Ok(state.count)
    }

    pub fn delete(&self) -> OsaResult<()> {
        let mut state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        state.alive = false;
        self.cond.notify_all();
        Ok(())
    }
}

fn dead() -> OsaError {
    OsaError::invalid_handle(ModuleId::Osa, "semaphore deleted")
}
