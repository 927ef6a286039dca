/*!
 * Task Manager
 * Registry of task descriptors with create, spawn, restart and teardown
 */

use super::context::TaskContext;
use super::task::{Registry, Task, TaskEntry, TaskSetup};
use super::types::{TaskAttributes, TaskConfig, TaskState};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::id::{AtomicGenerator, IdGenerator, TaskId};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TaskManager {
    tasks: Arc<Registry>,
    ids: AtomicGenerator,
    config: TaskConfig,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::with_config(TaskConfig::default())
    }

    pub fn with_config(config: TaskConfig) -> Self {
        info!(policy = ?config.policy, "task manager initialized");
        Self {
            tasks: Arc::new(DashMap::with_hasher(RandomState::new())),
            ids: AtomicGenerator::new(1),
            config,
        }
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Register a task without starting it
    pub fn create<F>(&self, attributes: TaskAttributes, entry: F) -> OsaResult<Task>
    where
        F: Fn(&TaskContext) -> i32 + Send + Sync + 'static,
    {
        self.create_with(attributes, Arc::new(entry))
    }

    /// Register a task from a shared entry
    pub fn create_with(&self, attributes: TaskAttributes, entry: TaskEntry) -> OsaResult<Task> {
        if attributes.name.as_deref().is_some_and(|n| n.contains('\0')) {
            return Err(OsaError::invalid_argument(
                ModuleId::Osa,
                "task name contains a NUL byte",
            ));
        }

        let id = self.ids.next();
        let policy = attributes.policy.unwrap_or(self.config.policy);
        let setup = TaskSetup {
            id,
            attributes,
            policy,
            default_stack: self.config.default_stack_size,
            registry: Arc::downgrade(&self.tasks),
        };
        let task = Task::new(setup, entry);
        self.tasks.insert(id, task.clone());
        tracing::debug!(task = %id, ?policy, "task created");
        Ok(task)
    }

    /// Create and start; the descriptor is dropped if the start fails
    pub fn spawn<F>(&self, attributes: TaskAttributes, entry: F) -> OsaResult<Task>
    where
        F: Fn(&TaskContext) -> i32 + Send + Sync + 'static,
    {
        let task = self.create(attributes, entry)?;
        if let Err(e) = task.start() {
            self.tasks.remove(&task.id());
            warn!(task = %task.id(), error = %e, "task spawn failed");
            return Err(e);
        }
        Ok(task)
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.get(&id).map(|t| t.value().clone())
    }

    /// Registered ids in ascending order
    pub fn list(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.tasks.iter().map(|t| *t.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    pub fn delete(&self, id: TaskId) -> OsaResult<()> {
        self.lookup(id)?.delete()
    }

    pub fn restart(&self, id: TaskId) -> OsaResult<()> {
        self.lookup(id)?.restart()
    }

    /// Cancel and join every task except the caller's own
    pub fn shutdown(&self) {
        let tasks: Vec<Task> = self.tasks.iter().map(|t| t.value().clone()).collect();
        let total = tasks.len();
        for task in tasks {
            if task.is_self() {
                continue;
            }
            if task.state() == TaskState::Deleted {
                continue;
            }
            if let Err(e) = task.delete() {
                warn!(task = %task.id(), error = %e, "task delete failed during shutdown");
            }
        }
        info!(tasks = total, remaining = self.count(), "task manager shut down");
    }

    fn lookup(&self, id: TaskId) -> OsaResult<Task> {
        self.get(id)
            .ok_or_else(|| OsaError::invalid_handle(ModuleId::Osa, format!("unknown {}", id)))
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
