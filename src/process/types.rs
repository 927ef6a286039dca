/*!
 * Task Types
 * Attributes, lifecycle states and events for tasks
 */

use crate::core::limits::{TASK_PRI_DEFAULT, TASK_PRI_MAX, TASK_PRI_MIN, TASK_STACKSIZE_DEFAULT};
use crate::core::types::Priority;
use serde::{Deserialize, Serialize};

/// How a task's priority reaches the OS
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedPolicy {
    /// Keep the creator's scheduling; the priority is only recorded
    #[default]
    Inherit,
    /// Run under SCHED_FIFO at the task priority (needs CAP_SYS_NICE)
    Fifo,
}

/// Task manager defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub policy: SchedPolicy,
    /// Stack size used when a task asks for 0
    pub default_stack_size: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            policy: SchedPolicy::Inherit,
            default_stack_size: TASK_STACKSIZE_DEFAULT,
        }
    }
}

impl TaskConfig {
    /// Real-time configuration for deployments with scheduling privileges
    pub fn realtime() -> Self {
        Self {
            policy: SchedPolicy::Fifo,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_stack_size(mut self, size: usize) -> Self {
        self.default_stack_size = size;
        self
    }
}

/// Clamp into the platform priority range
#[inline]
pub const fn clamp_priority(priority: Priority) -> Priority {
    if priority < TASK_PRI_MIN {
        TASK_PRI_MIN
    } else if priority > TASK_PRI_MAX {
        TASK_PRI_MAX
    } else {
        priority
    }
}

/// Creation attributes, kept for restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttributes {
    pub name: Option<String>,
    pub priority: Priority,
    /// 0 means the configured default
    pub stack_size: usize,
    /// `None` means the manager's policy
    pub policy: Option<SchedPolicy>,
}

impl TaskAttributes {
    pub fn new(priority: Priority, stack_size: usize) -> Self {
        Self {
            name: None,
            priority: clamp_priority(priority),
            stack_size,
            policy: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

impl Default for TaskAttributes {
    fn default() -> Self {
        Self::new(TASK_PRI_DEFAULT, TASK_STACKSIZE_DEFAULT)
    }
}

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Descriptor exists, no thread started yet
    Created,
    Running,
    /// The task asked to restart itself; a helper will start the next instance
    RestartRequested,
    /// Entry returned
    Exited,
    /// Stopped at a cancellation point
    Canceled,
    /// Descriptor released; every further operation fails
    Deleted,
}

impl TaskState {
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::RestartRequested)
    }
}

/// Lifecycle notification published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    Started { instance: u64 },
    Exited { instance: u64, code: i32 },
    Canceled { instance: u64 },
    RestartRequested { instance: u64 },
}

impl TaskEvent {
    pub fn instance(&self) -> u64 {
        match *self {
            Self::Started { instance }
            | Self::Exited { instance, .. }
            | Self::Canceled { instance }
            | Self::RestartRequested { instance } => instance,
        }
    }
}
