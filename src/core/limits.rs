/*!
 * System Limits and Constants
 *
 * Centralized location for every limit, default and magic number.
 * Grouped by domain; values carried over from the device firmware are marked [FW].
 */

use std::time::Duration;

// =============================================================================
// TASKS
// =============================================================================

/// Lowest real-time priority accepted by SCHED_FIFO on Linux [FW]
pub const TASK_PRI_MIN: i32 = 1;

/// Highest real-time priority accepted by SCHED_FIFO on Linux [FW]
pub const TASK_PRI_MAX: i32 = 99;

/// Midpoint of the priority range, used when the caller has no preference [FW]
pub const TASK_PRI_DEFAULT: i32 = TASK_PRI_MIN + (TASK_PRI_MAX - TASK_PRI_MIN) / 2;

/// Stack size 0 means "use the platform default" [FW]
pub const TASK_STACKSIZE_DEFAULT: usize = 0;

/// Smallest stack we hand to the OS when the caller asks for one
pub const TASK_STACKSIZE_MIN: usize = 16 * 1024;

/// How often a blocked joiner re-checks a canceled task
pub const TASK_JOIN_POLL: Duration = Duration::from_millis(5);

/// Longest a blocked wait on a task thread goes without looking at its cancel token
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

// =============================================================================
// MESSAGE QUEUES
// =============================================================================

/// Upper bound on slots per queue (pool is allocated up front)
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

/// Upper bound on a single message payload
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

// =============================================================================
// NETWORK
// =============================================================================

/// Send/receive buffer size applied to accepted sockets [FW]
pub const MAX_SOCKETBUF_SIZE: usize = 32_768;

/// OS-level send timeout on accepted sockets [FW]
pub const ACCEPTED_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// OS-level send timeout on outbound client sockets [FW]
pub const CLIENT_SEND_TIMEOUT: Duration = Duration::from_millis(50);

/// Listen backlog used when the caller passes 0
pub const DEFAULT_BACKLOG: u16 = 8;
