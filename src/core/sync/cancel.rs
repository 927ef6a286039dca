/*!
 * Cancellation Tokens
 *
 * One token per task instance. The task trampoline installs it as the
 * thread's current token, which turns every blocking wait in the crate into
 * a cancellation point: waits on such a thread are cut into short slices and
 * the token is looked at between them. Threads without a token block in one
 * piece.
 */

use crate::core::limits::CANCEL_POLL_INTERVAL;
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::panic;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Unwind payload raised when a blocking wait observes a cancel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Canceled;

thread_local! {
    static CURRENT: RefCell<Option<Arc<CancelToken>>> = const { RefCell::new(None) };
}

/// Per-instance cancel flag with an interruptible sleep
#[derive(Debug, Default)]
pub(crate) struct CancelToken {
    canceled: Mutex<bool>,
    cond: Condvar,
}

impl CancelToken {
    pub fn cancel(&self) {
        *self.canceled.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_canceled(&self) -> bool {
        *self.canceled.lock()
    }

    /// Unwind with [`Canceled`] if a cancel was requested
    pub fn unwind_if_canceled(&self) {
        if self.is_canceled() {
            panic::resume_unwind(Box::new(Canceled));
        }
    }

    /// Sleep up to `d`; true if a cancel arrived first
    pub fn sleep(&self, d: Duration) -> bool {
        let until = Instant::now().checked_add(d);
        let mut canceled = self.canceled.lock();
        while !*canceled {
            match until {
                Some(at) => {
                    if self.cond.wait_until(&mut canceled, at).timed_out() {
                        break;
                    }
                }
                None => self.cond.wait(&mut canceled),
            }
        }
        *canceled
    }
}

/// Restores the previous token when dropped
#[must_use]
pub(crate) struct Installed {
    previous: Option<Arc<CancelToken>>,
}

impl Drop for Installed {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

/// Make `token` the calling thread's current token
pub(crate) fn install(token: Arc<CancelToken>) -> Installed {
    let previous = CURRENT.with(|current| current.borrow_mut().replace(token));
    Installed { previous }
}

/// Token installed on the calling thread, if any
pub(crate) fn current() -> Option<Arc<CancelToken>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// How long one slice of a blocking wait may last on this thread
///
/// `None` when no token is installed; the caller waits in one piece.
pub(crate) fn slice(token: Option<&CancelToken>) -> Option<Duration> {
    token.map(|token| {
        token.unwind_if_canceled();
        CANCEL_POLL_INTERVAL
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sleep_runs_full_duration_without_cancel() {
        let token = CancelToken::default();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let token = Arc::new(CancelToken::default());
        let sleeper = {
            let token = Arc::clone(&token);
            thread::spawn(move || token.sleep(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(sleeper.join().unwrap());
        assert!(token.is_canceled());
    }

    #[test]
    fn test_install_is_scoped() {
        assert!(current().is_none());
        let outer = Arc::new(CancelToken::default());
        {
            let _installed = install(Arc::clone(&outer));
            assert!(current().is_some_and(|t| Arc::ptr_eq(&t, &outer)));
        }
        assert!(current().is_none());
    }

    #[test]
    fn test_canceled_token_unwinds_with_marker() {
        let token = CancelToken::default();
        token.cancel();
        let payload = panic::catch_unwind(panic::AssertUnwindSafe(|| token.unwind_if_canceled()))
            .unwrap_err();
        assert!(payload.is::<Canceled>());
    }
}
