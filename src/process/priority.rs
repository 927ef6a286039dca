/*!
 * Thread Priority
 * pthread scheduling parameters for task threads
 */

use super::types::clamp_priority;
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::types::Priority;

/// Raw OS thread handle
pub type RawThread = libc::pthread_t;

/// Switch `thread` to SCHED_FIFO at `priority`
pub(crate) fn apply_fifo(thread: RawThread, priority: Priority) -> OsaResult<()> {
    let mut param = zeroed_param();
    param.sched_priority = clamp_priority(priority);
    // SAFETY: `thread` belongs to a JoinHandle that has not been joined yet
    let rc = unsafe { libc::pthread_setschedparam(thread, libc::SCHED_FIFO, &param) };
    check(rc)
}

/// Change priority while keeping the thread's current policy
fn set_thread_priority(thread: RawThread, priority: Priority) -> OsaResult<()> {
    let mut policy = 0;
    let mut param = zeroed_param();
    // SAFETY: see apply_fifo; both out-pointers are valid locals
    check(unsafe { libc::pthread_getschedparam(thread, &mut policy, &mut param) })?;
    param.sched_priority = clamp_priority(priority);
    // SAFETY: as above
    check(unsafe { libc::pthread_setschedparam(thread, policy, &param) })
}

pub(crate) fn thread_priority(thread: RawThread) -> OsaResult<Priority> {
    let mut policy = 0;
    let mut param = zeroed_param();
    // SAFETY: see apply_fifo
    check(unsafe { libc::pthread_getschedparam(thread, &mut policy, &mut param) })?;
    Ok(param.sched_priority)
}

/// Set the calling thread's priority under its current policy
pub fn set_current_priority(priority: Priority) -> OsaResult<()> {
    // SAFETY: pthread_self is always valid for the calling thread
    set_thread_priority(unsafe { libc::pthread_self() }, priority)
}

/// Calling thread's scheduling priority (0 under the default time-sharing policy)
pub fn current_priority() -> OsaResult<Priority> {
    // SAFETY: as above
    thread_priority(unsafe { libc::pthread_self() })
}

fn zeroed_param() -> libc::sched_param {
    // SAFETY: sched_param is plain old data; all-zero is a valid value
    unsafe { std::mem::zeroed() }
}

fn check(rc: libc::c_int) -> OsaResult<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(OsaError::errno(ModuleId::Osa, nix::errno::Errno::from_raw(rc)))
    }
}
