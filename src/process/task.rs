/*!
 * Task
 *
 * One OS thread per running instance, re-created from the stored entry and
 * attributes on every (re)start.
 *
 * # Lifecycle
 *
 * - `Created` → `start` → `Running` → `Exited` | `Canceled`
 * - restart by another thread: cancel + join, then a fresh instance
 * - restart by the task itself: `RestartRequested`, a detached helper joins
 *   the old instance and starts the next one while the old thread unwinds
 * - `delete`: cancel + join from outside, or unwind and detach from inside
 */

use super::context::{unwind, TaskContext, TaskExit};
use super::priority::{apply_fifo, current_priority, set_current_priority, thread_priority, RawThread};
use super::types::{clamp_priority, SchedPolicy, TaskAttributes, TaskEvent, TaskState};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::id::TaskId;
use crate::core::limits::{TASK_JOIN_POLL, TASK_STACKSIZE_MIN};
use crate::core::sync::cancel::{self, CancelToken, Canceled};
use crate::core::types::Priority;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::os::unix::thread::JoinHandleExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};

/// Task body, invoked once per instance
pub type TaskEntry = Arc<dyn Fn(&TaskContext) -> i32 + Send + Sync>;

pub(crate) type Registry = DashMap<TaskId, Task, RandomState>;

/// Settings resolved by the manager at creation
pub(crate) struct TaskSetup {
    pub id: TaskId,
    pub attributes: TaskAttributes,
    pub policy: SchedPolicy,
    pub default_stack: usize,
    pub registry: Weak<Registry>,
}

struct Instance {
    number: u64,
    thread: Option<JoinHandle<()>>,
    raw: RawThread,
    thread_id: ThreadId,
    token: Arc<CancelToken>,
}

struct Lifecycle {
    state: TaskState,
    current: Option<Instance>,
    launched: u64,
}

struct TaskInner {
    id: TaskId,
    entry: TaskEntry,
    policy: SchedPolicy,
    default_stack: usize,
    attributes: Mutex<TaskAttributes>,
    life: Mutex<Lifecycle>,
    subscribers: Mutex<Vec<flume::Sender<TaskEvent>>>,
    registry: Weak<Registry>,
}

/// Shared handle to a task descriptor
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    pub(crate) fn new(setup: TaskSetup, entry: TaskEntry) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: setup.id,
                entry,
                policy: setup.policy,
                default_stack: setup.default_stack,
                attributes: Mutex::new(setup.attributes),
                life: Mutex::new(Lifecycle {
                    state: TaskState::Created,
                    current: None,
                    launched: 0,
                }),
                subscribers: Mutex::new(Vec::new()),
                registry: setup.registry,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn state(&self) -> TaskState {
        self.inner.life.lock().state
    }

    /// Number of instances launched so far
    pub fn instances(&self) -> u64 {
        self.inner.life.lock().launched
    }

    pub fn attributes(&self) -> TaskAttributes {
        self.inner.attributes.lock().clone()
    }

    /// OS thread of the live instance
    pub fn thread_id(&self) -> Option<ThreadId> {
        let life = self.inner.life.lock();
        if life.state.is_live() {
            life.current.as_ref().map(|i| i.thread_id)
        } else {
            None
        }
    }

    /// True when called from this task's own thread
    pub fn is_self(&self) -> bool {
        let me = thread::current().id();
        self.inner
            .life
            .lock()
            .current
            .as_ref()
            .is_some_and(|i| i.thread_id == me)
    }

    /// Lifecycle events from now on
    pub fn subscribe(&self) -> flume::Receiver<TaskEvent> {
        let (tx, rx) = flume::unbounded();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    /// Spawn a thread for the next instance
    ///
    /// Fails with `Busy` while an instance is live. A failed start leaves the
    /// descriptor untouched so it can be retried.
    pub fn start(&self) -> OsaResult<()> {
        let mut life = self.inner.life.lock();
        match life.state {
            TaskState::Deleted => Err(dead(self.id())),
            TaskState::Running | TaskState::RestartRequested => Err(OsaError::busy(
                ModuleId::Osa,
                format!("{} already running", self.id()),
            )),
            TaskState::Created | TaskState::Exited | TaskState::Canceled => {
                reap(&mut life);
                self.launch(&mut life)
            }
        }
    }

    /// Restart the task with its stored attributes
    ///
    /// From another thread: cancel, join and start a fresh instance.
    /// From the task's own thread: hand the restart to a detached helper and
    /// end the calling instance; on success this call does not return.
    pub fn restart(&self) -> OsaResult<()> {
        if self.is_self() {
            return self.restart_self();
        }

        self.wait_settled();
        if self.state() == TaskState::Deleted {
            return Err(dead(self.id()));
        }
        self.cancel_and_join();

        let mut life = self.inner.life.lock();
        match life.state {
            TaskState::Deleted => Err(dead(self.id())),
            state if state.is_live() => Err(OsaError::busy(
                ModuleId::Osa,
                format!("{} restarted concurrently", self.id()),
            )),
            _ => {
                reap(&mut life);
                self.launch(&mut life)
            }
        }
    }

    /// Release the task
    ///
    /// From another thread: cancel and join the live instance first.
    /// From the task's own thread: the thread ends itself and is detached;
    /// this call does not return.
    pub fn delete(&self) -> OsaResult<()> {
        if self.is_self() {
            if self.state() == TaskState::Deleted {
                return Err(dead(self.id()));
            }
            unwind(TaskExit::Deleted);
        }

        self.wait_settled();
        if self.state() == TaskState::Deleted {
            return Err(dead(self.id()));
        }
        self.cancel_and_join();

        {
            let mut life = self.inner.life.lock();
            life.state = TaskState::Deleted;
            life.current = None;
        }
        self.unregister();
        tracing::debug!(task = %self.id(), "task deleted");
        Ok(())
    }

    /// Set the scheduling priority, clamped to the platform range
    ///
    /// Under `SchedPolicy::Fifo` a live instance is updated immediately;
    /// otherwise the value is recorded for the next instance.
    pub fn set_priority(&self, priority: Priority) -> OsaResult<Priority> {
        let priority = clamp_priority(priority);
        let life = self.inner.life.lock();
        if life.state == TaskState::Deleted {
            return Err(dead(self.id()));
        }
        if self.inner.policy == SchedPolicy::Fifo && life.state.is_live() {
            if let Some(instance) = life.current.as_ref() {
                apply_fifo(instance.raw, priority)?;
            }
        }
        self.inner.attributes.lock().priority = priority;
        Ok(priority)
    }

    /// Effective priority: the OS value for a live real-time instance,
    /// the recorded one otherwise
    pub fn priority(&self) -> OsaResult<Priority> {
        let life = self.inner.life.lock();
        if life.state == TaskState::Deleted {
            return Err(dead(self.id()));
        }
        if self.inner.policy == SchedPolicy::Fifo && life.state.is_live() {
            if let Some(instance) = life.current.as_ref() {
                return thread_priority(instance.raw);
            }
        }
        Ok(self.inner.attributes.lock().priority)
    }

    fn restart_self(&self) -> OsaResult<()> {
        let instance = {
            let mut life = self.inner.life.lock();
            if life.state == TaskState::Deleted {
                return Err(dead(self.id()));
            }
            life.state = TaskState::RestartRequested;
            life.launched
        };
        self.publish(TaskEvent::RestartRequested { instance });

        let task = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-restart", self.id()))
            .spawn(move || task.complete_restart());

        if let Err(e) = spawned {
            self.inner.life.lock().state = TaskState::Running;
            return Err(OsaError::Spawn {
                module: ModuleId::Osa,
                message: e.to_string(),
            });
        }
        tracing::debug!(task = %self.id(), instance, "self-restart handed to helper");
        unwind(TaskExit::Restart)
    }

    /// Helper thread body: wait for the old instance, then start the next
    fn complete_restart(self) {
        let old = {
            let mut life = self.inner.life.lock();
            life.current.as_mut().and_then(|i| i.thread.take())
        };
        if let Some(handle) = old {
            if handle.join().is_err() {
                tracing::warn!(task = %self.id(), "old instance ended abnormally");
            }
        }

        let mut life = self.inner.life.lock();
        if life.state != TaskState::RestartRequested {
            return;
        }
        life.current = None;
        if let Err(e) = self.launch(&mut life) {
            life.state = TaskState::Exited;
            tracing::error!(task = %self.id(), error = %e, "self-restart failed to start new instance");
        }
    }

    /// Spawn the next instance; caller holds the lifecycle lock
    fn launch(&self, life: &mut Lifecycle) -> OsaResult<()> {
        let number = life.launched + 1;
        let attributes = self.attributes();
        let token = Arc::new(CancelToken::default());
        let (go_tx, go_rx) = flume::bounded::<bool>(1);

        let name = attributes
            .name
            .clone()
            .unwrap_or_else(|| self.id().to_string());
        let mut builder = thread::Builder::new().name(name);
        let stack = match attributes.stack_size {
            0 => self.inner.default_stack,
            n => n,
        };
        if stack > 0 {
            builder = builder.stack_size(stack.max(TASK_STACKSIZE_MIN));
        }

        let task = self.clone();
        let thread_token = Arc::clone(&token);
        let handle = builder
            .spawn(move || task.run(number, thread_token, go_rx))
            .map_err(|e| OsaError::Spawn {
                module: ModuleId::Osa,
                message: e.to_string(),
            })?;

        let raw = handle.as_pthread_t() as RawThread;
        if self.inner.policy == SchedPolicy::Fifo {
            if let Err(e) = apply_fifo(raw, attributes.priority) {
                let _ = go_tx.send(false);
                let _ = handle.join();
                return Err(e);
            }
        }

        life.launched = number;
        life.state = TaskState::Running;
        life.current = Some(Instance {
            number,
            thread_id: handle.thread().id(),
            thread: Some(handle),
            raw,
            token,
        });
        let _ = go_tx.send(true);
        Ok(())
    }

    /// Trampoline: runs the entry and records how the instance ended
    fn run(self, number: u64, token: Arc<CancelToken>, go: flume::Receiver<bool>) {
        if !go.recv().unwrap_or(false) {
            return;
        }
        self.publish(TaskEvent::Started { instance: number });
        tracing::debug!(task = %self.id(), instance = number, "task instance started");

        let installed = cancel::install(Arc::clone(&token));
        let ctx = TaskContext::new(self.clone(), number, token);
        let entry = Arc::clone(&self.inner.entry);
        let result = panic::catch_unwind(AssertUnwindSafe(|| entry(&ctx)));
        drop(ctx);
        drop(installed);

        let exit = match result {
            Ok(code) => TaskExit::Exit(code),
            Err(payload) => match payload.downcast::<TaskExit>() {
                Ok(reason) => *reason,
                // a cancel observed inside a blocking wait
                Err(payload) if payload.is::<Canceled>() => TaskExit::Canceled,
                Err(_) => {
                    tracing::error!(task = %self.id(), instance = number, "task entry panicked");
                    TaskExit::Exit(-1)
                }
            },
        };
        self.finish(number, exit);
    }

    fn finish(&self, number: u64, exit: TaskExit) {
        let event = {
            let mut life = self.inner.life.lock();
            let is_current = life.current.as_ref().map(|i| i.number) == Some(number);
            match exit {
                TaskExit::Exit(code) => {
                    if is_current && life.state == TaskState::Running {
                        life.state = TaskState::Exited;
                    }
                    TaskEvent::Exited {
                        instance: number,
                        code,
                    }
                }
                TaskExit::Restart => TaskEvent::Exited {
                    instance: number,
                    code: 0,
                },
                TaskExit::Canceled => {
                    if is_current && life.state == TaskState::Running {
                        life.state = TaskState::Canceled;
                    }
                    TaskEvent::Canceled { instance: number }
                }
                TaskExit::Deleted => {
                    life.state = TaskState::Deleted;
                    // cannot join ourselves: dropping the handle detaches
                    if is_current {
                        life.current = None;
                    }
                    TaskEvent::Exited {
                        instance: number,
                        code: 0,
                    }
                }
            }
        };

        if exit == TaskExit::Deleted {
            self.unregister();
        }
        tracing::debug!(task = %self.id(), instance = number, ?exit, "task instance ended");
        self.publish(event);
    }

    fn cancel_and_join(&self) {
        let (handle, token) = {
            let mut life = self.inner.life.lock();
            match life.current.as_mut() {
                Some(instance) => (instance.thread.take(), Some(Arc::clone(&instance.token))),
                None => (None, None),
            }
        };
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(task = %self.id(), "canceled instance ended abnormally");
            }
        }
    }

    /// Wait out a self-restart in progress
    fn wait_settled(&self) {
        while self.state() == TaskState::RestartRequested {
            thread::sleep(TASK_JOIN_POLL);
        }
    }

    fn unregister(&self) {
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.remove(&self.id());
        }
    }

    fn publish(&self, event: TaskEvent) {
        self.inner
            .subscribers
            .lock()
            .retain(|tx| tx.send(event).is_ok());
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Join a finished instance that nobody joined yet
fn reap(life: &mut Lifecycle) {
    if let Some(mut old) = life.current.take() {
        if let Some(handle) = old.thread.take() {
            let _ = handle.join();
        }
    }
}

fn dead(id: TaskId) -> OsaError {
    OsaError::invalid_handle(ModuleId::Osa, format!("{} deleted", id))
}

/// Set the priority of `task`, or of the calling thread when `None`
pub fn set_priority(task: Option<&Task>, priority: Priority) -> OsaResult<Priority> {
    match task {
        Some(task) => task.set_priority(priority),
        None => {
            let priority = clamp_priority(priority);
            set_current_priority(priority)?;
            Ok(priority)
        }
    }
}

/// Priority of `task`, or of the calling thread when `None`
pub fn get_priority(task: Option<&Task>) -> OsaResult<Priority> {
    match task {
        Some(task) => task.priority(),
        None => current_priority(),
    }
}

/// Thread identity of `task`'s live instance, or of the caller when `None`
pub fn thread_id(task: Option<&Task>) -> Option<ThreadId> {
    match task {
        Some(task) => task.thread_id(),
        None => Some(thread::current().id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn task<F>(entry: F) -> Task
    where
        F: Fn(&TaskContext) -> i32 + Send + Sync + 'static,
    {
        Task::new(
            TaskSetup {
                id: TaskId(1),
                attributes: TaskAttributes::default(),
                policy: SchedPolicy::Inherit,
                default_stack: 0,
                registry: Weak::new(),
            },
            Arc::new(entry),
        )
    }

    fn next(rx: &flume::Receiver<TaskEvent>) -> TaskEvent {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_entry_exit_code_published() {
        let t = task(|_| 7);
        let rx = t.subscribe();
        t.start().unwrap();
        assert_eq!(next(&rx), TaskEvent::Started { instance: 1 });
        assert_eq!(next(&rx), TaskEvent::Exited { instance: 1, code: 7 });
        assert_eq!(t.state(), TaskState::Exited);
    }

    #[test]
    fn test_start_twice_is_busy() {
        let t = task(|ctx| loop {
            ctx.sleep(Duration::from_millis(5));
        });
        t.start().unwrap();
        assert!(matches!(t.start(), Err(OsaError::Busy { .. })));
        t.delete().unwrap();
        assert_eq!(t.state(), TaskState::Deleted);
        assert!(matches!(t.start(), Err(OsaError::InvalidHandle { .. })));
    }

    #[test]
    fn test_external_restart_cancels_and_relaunches() {
        let t = task(|ctx| loop {
            ctx.sleep(Duration::from_millis(5));
        });
        let rx = t.subscribe();
        t.start().unwrap();
        assert_eq!(next(&rx), TaskEvent::Started { instance: 1 });

        t.restart().unwrap();
        assert_eq!(next(&rx), TaskEvent::Canceled { instance: 1 });
        assert_eq!(next(&rx), TaskEvent::Started { instance: 2 });
        assert_eq!(t.instances(), 2);
        t.delete().unwrap();
    }

    #[test]
    fn test_panicking_entry_exits_with_minus_one() {
        let t = task(|_| panic!("boom"));
        let rx = t.subscribe();
        t.start().unwrap();
        assert_eq!(next(&rx), TaskEvent::Started { instance: 1 });
        assert_eq!(next(&rx), TaskEvent::Exited { instance: 1, code: -1 });
    }

    #[test]
    fn test_priority_recorded_without_realtime() {
        let t = task(|_| 0);
        assert_eq!(t.set_priority(200).unwrap(), 99);
        assert_eq!(t.priority().unwrap(), 99);
        assert_eq!(get_priority(Some(&t)).unwrap(), 99);
    }

    #[test]
    fn test_thread_identity() {
        assert_eq!(thread_id(None), Some(thread::current().id()));
        let t = task(|ctx| {
            let same = ctx.task().is_self() && thread_id(Some(ctx.task())) == Some(thread::current().id());
            i32::from(same)
        });
        let rx = t.subscribe();
        t.start().unwrap();
        next(&rx);
        assert_eq!(next(&rx), TaskEvent::Exited { instance: 1, code: 1 });
        assert!(!t.is_self());
    }
}
