/*!
 * Core Types
 * Common types used across the adapter
 */

use serde::{Deserialize, Serialize};

/// Task scheduling priority (clamped to the platform range on use)
pub type Priority = i32;

/// Byte count moved by a transfer or carried by a message
pub type Size = usize;

/// Non-error half of the tri-state convention
///
/// Paired with `OsaResult`, it gives every blocking call the same three answers:
/// `Err` (negative), `Pending` (zero: timed out or made no progress) and
/// `Ready` (positive: succeeded, with a value such as a byte count).
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome<T> {
    Ready(T),
    Pending,
}

impl<T> Outcome<T> {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[inline]
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending => None,
        }
    }

    #[inline]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Ready(value) => Outcome::Ready(f(value)),
            Self::Pending => Outcome::Pending,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Ready(v),
            None => Self::Pending,
        }
    }
}
