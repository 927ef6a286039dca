/*!
 * Mutex
 *
 * Exclusive lock with the shared timeout contract on acquisition.
 * Ownership is tracked per thread so misuse is reported instead of
 * deadlocking: relocking from the owner is `Busy`, unlocking from a
 * non-owner is `InvalidArgument`.
 */

use super::timeout::Timeout;
use super::wait::{wait_until, Condition, WaitStatus};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::types::Outcome;
use parking_lot::{Condvar, Mutex as RawMutex};
use std::thread::{self, ThreadId};

#[derive(Debug)]
struct LockState {
    owner: Option<ThreadId>,
    alive: bool,
}

/// Non-reentrant exclusive lock
#[derive(Debug)]
pub struct Mutex {
    state: RawMutex<LockState>,
    cond: Condvar,
}

impl Mutex {
    pub fn new() -> Self {
        Self {
            state: RawMutex::new(LockState {
                owner: None,
                alive: true,
            }),
            cond: Condvar::new(),
        }
    }

    /// Acquire the lock within `timeout`
    pub fn lock(&self, timeout: Timeout) -> OsaResult<Outcome<()>> {
        let me = thread::current().id();
        let deadline = timeout.deadline();
        let mut state = self.state.lock();

        if state.alive && state.owner == Some(me) {
            return Err(OsaError::busy(ModuleId::Osa, "mutex already held by caller"));
        }

        let status = wait_until(&self.cond, &mut state, deadline, |s| {
            if !s.alive {
                Condition::Gone
            } else if s.owner.is_none() {
                s.owner = Some(me);
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

    /// Release the lock held by the calling thread
    pub fn unlock(&self) -> OsaResult<()> {
        let mut state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        if state.owner != Some(thread::current().id()) {
            return Err(OsaError::invalid_argument(
                ModuleId::Osa,
                "mutex not held by caller",
            ));
        }
        state.owner = None;
        self.cond.notify_one();
        Ok(())
    }

    /// Acquire and return a guard that unlocks on drop
    pub fn guard(&self, timeout: Timeout) -> OsaResult<Outcome<MutexGuard<'_>>> {
        Ok(self.lock(timeout)?.map(|()| MutexGuard { mutex: self }))
    }

    pub fn is_locked(&self) -> OsaResult<bool> {
        let state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        Ok(state.owner.is_some())
    }

    /// Invalidate the mutex; blocked lockers return `InvalidHandle`
    pub fn delete(&self) -> OsaResult<()> {
        let mut state = self.state.lock();
        if !state.alive {
            return Err(dead());
        }
        state.alive = false;
        state.owner = None;
        self.cond.notify_all();
        Ok(())
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`Mutex::guard`]
#[must_use = "the mutex unlocks as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.mutex.unlock() {
            tracing::debug!(error = %e, "mutex guard release skipped");
        }
    }
}

fn dead() -> OsaError {
    OsaError::invalid_handle(ModuleId::Osa, "mutex deleted")
}
