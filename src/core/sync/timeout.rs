/*!
 * Timeout Contract
 *
 * One timeout vocabulary for every blocking operation in the adapter:
 *
 * - **NoWait**: try once and return immediately
 * - **Forever**: block until the condition holds
 * - **Millis(n)**: block until `now + n` on the monotonic clock
 *
 * A call turns its `Timeout` into a [`Deadline`] exactly once, on entry, and
 * every retry inside that call measures against the same deadline.
 *
 * ## Example
 *
 * ```
 * use osa_kernel::core::sync::Timeout;
 * use std::time::Duration;
 *
 * assert_eq!(Timeout::from_millis_raw(0), Timeout::NoWait);
 * assert_eq!(Timeout::from_millis_raw(-1), Timeout::Forever);
 * assert_eq!(Timeout::from(Duration::from_millis(250)), Timeout::Millis(250));
 * ```
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// How long a blocking operation may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeout {
    NoWait,
    Forever,
    Millis(u32),
}

impl Timeout {
    /// Decode the legacy integer form: `0` no wait, negative forever, positive bounded
    pub const fn from_millis_raw(raw: i32) -> Self {
        if raw == 0 {
            Self::NoWait
        } else if raw < 0 {
            Self::Forever
        } else {
            Self::Millis(raw as u32)
        }
    }

    /// Encode back into the legacy integer form
    pub const fn to_millis_raw(self) -> i32 {
        match self {
            Self::NoWait => 0,
            Self::Forever => -1,
            Self::Millis(ms) if ms > i32::MAX as u32 => i32::MAX,
            Self::Millis(ms) => ms as i32,
        }
    }

    /// Bounded duration, `None` for `Forever`
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::NoWait => Some(Duration::ZERO),
            Self::Forever => None,
            Self::Millis(ms) => Some(Duration::from_millis(ms as u64)),
        }
    }

    #[inline]
    pub const fn is_no_wait(self) -> bool {
        matches!(self, Self::NoWait | Self::Millis(0))
    }

    /// Fix the absolute deadline for this call
    #[inline]
    pub fn deadline(self) -> Deadline {
        Deadline::after(self)
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::Forever
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            return Self::NoWait;
        }
        let ms = d.as_millis().max(1);
        Self::Millis(u32::try_from(ms).unwrap_or(u32::MAX))
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Self::Forever, Self::from)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWait => f.write_str("no-wait"),
            Self::Forever => f.write_str("forever"),
            Self::Millis(ms) => write!(f, "{}ms", ms),
        }
    }
}

/// Absolute point on the monotonic clock after which a call gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Expired from the start; the operation gets exactly one attempt
    Immediate,
    Never,
    At(Instant),
}

impl Deadline {
    pub fn after(timeout: Timeout) -> Self {
        match timeout {
            Timeout::NoWait | Timeout::Millis(0) => Self::Immediate,
            Timeout::Forever => Self::Never,
            Timeout::Millis(ms) => Instant::now()
                .checked_add(Duration::from_millis(ms as u64))
                .map_or(Self::Never, Self::At),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self {
            Self::Immediate => true,
            Self::Never => false,
            Self::At(at) => Instant::now() >= *at,
        }
    }

    /// Time left, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Immediate => Some(Duration::ZERO),
            Self::Never => None,
            Self::At(at) => Some(at.saturating_duration_since(Instant::now())),
        }
    }

    /// The same deadline expressed as a fresh timeout (for nested calls)
    pub fn as_timeout(&self) -> Timeout {
        match self.remaining() {
            None => Timeout::Forever,
            Some(left) if left.is_zero() => Timeout::NoWait,
            Some(left) => Timeout::from(left),
        }
    }
}

/// Suspend the calling thread for `ms` milliseconds
pub fn delay(ms: u32) {
    std::thread::sleep(Duration::from_millis(ms as u64));
}
