/*!
 * Condition Wait
 *
 * The single blocking loop shared by Event, Mutex, Semaphore and MessageQueue.
 * Each primitive owns one `parking_lot::Mutex` over its state plus one or more
 * `Condvar`s; this helper re-checks the caller's condition after every wakeup
 * (spurious or not) until it holds, the object goes away, or the deadline passes.
 */

use super::cancel;
use super::timeout::Deadline;
use parking_lot::{Condvar, MutexGuard};
use std::time::Instant;

/// What the caller's condition reports on each check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Condition holds; the closure has already consumed the resource
    Ready,
    /// Keep waiting
    Blocked,
    /// Object was deleted while waiting
    Gone,
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Ready,
    TimedOut,
    Gone,
}

/// Block on `cv` until `check` reports something other than `Blocked`
///
/// `check` runs with the lock held, first before any blocking. A bounded wait
/// that times out gets one last check so a wakeup racing the deadline is not lost.
///
/// On a thread with a cancel token the wait is sliced; a cancel observed
/// between slices unwinds the thread, releasing the lock on the way out.
pub fn wait_until<T, F>(
    cv: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    deadline: Deadline,
    mut check: F,
) -> WaitStatus
where
    F: FnMut(&mut T) -> Condition,
{
    let token = cancel::current();
    loop {
        match check(&mut **guard) {
            Condition::Ready => return WaitStatus::Ready,
            Condition::Gone => return WaitStatus::Gone,
            Condition::Blocked => {}
        }
        let until = match deadline {
            Deadline::Immediate => return WaitStatus::TimedOut,
            Deadline::Never => None,
            Deadline::At(at) => Some(at),
        };

        let slice_end = cancel::slice(token.as_deref()).map(|slice| Instant::now() + slice);
        match (until, slice_end) {
            (None, None) => cv.wait(guard),
            (None, Some(end)) => {
                cv.wait_until(guard, end);
            }
            (Some(at), end) => {
                let wake = end.map_or(at, |end| end.min(at));
                if cv.wait_until(guard, wake).timed_out() && wake == at {
                    return match check(&mut **guard) {
                        Condition::Ready => WaitStatus::Ready,
                        Condition::Gone => WaitStatus::Gone,
                        Condition::Blocked => WaitStatus::TimedOut,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::Timeout;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_immediate_checks_once() {
        let lock = Mutex::new(0u32);
        let cv = Condvar::new();
        let mut calls = 0;
        let mut guard = lock.lock();
        let status = wait_until(&cv, &mut guard, Timeout::NoWait.deadline(), |_| {
            calls += 1;
            Condition::Blocked
        });
        assert_eq!(status, WaitStatus::TimedOut);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_wakes_on_notify() {
        let shared = Arc::new((Mutex::new(false), Condvar::new()));
        let signaller = Arc::clone(&shared);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            *signaller.0.lock() = true;
            signaller.1.notify_one();
        });

        let mut guard = shared.0.lock();
        let status = wait_until(&shared.1, &mut guard, Timeout::Millis(5_000).deadline(), |flag| {
            if *flag {
                Condition::Ready
            } else {
                Condition::Blocked
            }
        });
        drop(guard);
        handle.join().unwrap();
        assert_eq!(status, WaitStatus::Ready);
    }

    #[test]
    fn test_cancel_unwinds_forever_wait() {
        use crate::core::sync::cancel::{install, CancelToken, Canceled};
        use std::panic::{self, AssertUnwindSafe};

        let shared = Arc::new((Mutex::new(()), Condvar::new()));
        let token = Arc::new(CancelToken::default());
        let waiter = {
            let shared = Arc::clone(&shared);
            let token = Arc::clone(&token);
            thread::spawn(move || {
                let _installed = install(token);
                panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut guard = shared.0.lock();
                    wait_until(&shared.1, &mut guard, Timeout::Forever.deadline(), |_| {
                        Condition::Blocked
                    })
                }))
            })
        };

        thread::sleep(Duration::from_millis(30));
        token.cancel();
        let payload = waiter.join().unwrap().unwrap_err();
        assert!(payload.is::<Canceled>());
        // the unwind released the lock
        assert!(shared.0.try_lock().is_some());
    }

    #[test]
    fn test_sliced_wait_keeps_its_deadline() {
        use crate::core::sync::cancel::{install, CancelToken};
        use std::time::Instant;

        let _installed = install(Arc::new(CancelToken::default()));
        let lock = Mutex::new(());
        let cv = Condvar::new();
        let start = Instant::now();
        let mut guard = lock.lock();
        let status = wait_until(&cv, &mut guard, Timeout::Millis(40).deadline(), |_| {
            Condition::Blocked
        });
        assert_eq!(status, WaitStatus::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_gone_short_circuits() {
        let lock = Mutex::new(());
        let cv = Condvar::new();
        let mut guard = lock.lock();
        let status = wait_until(&cv, &mut guard, Timeout::Forever.deadline(), |_| Condition::Gone);
        assert_eq!(status, WaitStatus::Gone);
    }
}
