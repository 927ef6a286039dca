/*!
 * Task Context
 *
 * What a running task instance sees of itself. Cancellation is cooperative:
 * `checkpoint`, `sleep` and every blocking wait on a crate primitive or
 * socket are the cancellation points. When a cancel has been requested they
 * unwind the task thread back to its trampoline, which records the exit.
 */

use super::task::Task;
use crate::core::id::TaskId;
use crate::core::sync::cancel::CancelToken;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

/// Why a task thread is unwinding to its trampoline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskExit {
    Canceled,
    Deleted,
    Restart,
    Exit(i32),
}

/// Leave the task thread now
pub(crate) fn unwind(reason: TaskExit) -> ! {
    panic::resume_unwind(Box::new(reason))
}

/// Handle passed to a task's entry on every instance
pub struct TaskContext {
    task: Task,
    instance: u64,
    token: Arc<CancelToken>,
}

impl TaskContext {
    pub(crate) fn new(task: Task, instance: u64, token: Arc<CancelToken>) -> Self {
        Self {
            task,
            instance,
            token,
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Instance number, starting at 1 and growing with every (re)start
    #[inline]
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// The task this instance belongs to
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_canceled()
    }

    /// Cancellation point
    pub fn checkpoint(&self) {
        if self.token.is_canceled() {
            unwind(TaskExit::Canceled);
        }
    }

    /// Sleep for `d`; a cancellation point that wakes early on cancel
    pub fn sleep(&self, d: Duration) {
        if self.token.sleep(d) {
            unwind(TaskExit::Canceled);
        }
    }

    /// End this instance with `code`, as if the entry had returned it
    pub fn exit(&self, code: i32) -> ! {
        unwind(TaskExit::Exit(code))
    }
}
