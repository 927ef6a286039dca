/*!
 * ID Generation
 * Typed identifiers per object kind, with optional recycling
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Task descriptor id (never reused within a process)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

/// Accepted peer connection owned by a server (recycled after close)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

// ============================================================================
// ID Generator Trait
// ============================================================================

/// Generic ID generator interface
pub trait IdGenerator<T> {
    fn next(&self) -> T;

    /// Give an id back for reuse (no-op for non-recycling generators)
    fn recycle(&self, id: T);
}

/// Monotonic generator for long-lived ids
#[derive(Clone)]
pub struct AtomicGenerator {
    counter: Arc<AtomicU32>,
}

impl AtomicGenerator {
    pub fn new(start: u32) -> Self {
        Self {
            counter: Arc::new(AtomicU32::new(start)),
        }
    }
}

impl IdGenerator<TaskId> for AtomicGenerator {
    #[inline]
    fn next(&self) -> TaskId {
        TaskId(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    #[inline]
    fn recycle(&self, _id: TaskId) {}
}

/// Generator that hands out recycled ids before fresh ones
///
/// # Performance
/// - Lock-free recycling via SegQueue
/// - Keeps peer ids small on long-running servers
#[derive(Clone)]
pub struct RecyclingGenerator {
    counter: Arc<AtomicU32>,
    free_list: Arc<crossbeam_queue::SegQueue<u32>>,
}

impl RecyclingGenerator {
    pub fn new(start: u32) -> Self {
        Self {
            counter: Arc::new(AtomicU32::new(start)),
            free_list: Arc::new(crossbeam_queue::SegQueue::new()),
        }
    }
}

impl IdGenerator<PeerId> for RecyclingGenerator {
    #[inline]
    fn next(&self) -> PeerId {
        PeerId(
            self.free_list
                .pop()
                .unwrap_or_else(|| self.counter.fetch_add(1, Ordering::SeqCst)),
        )
    }

    #[inline]
    fn recycle(&self, id: PeerId) {
        self.free_list.push(id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_generator() {
        let gen = AtomicGenerator::new(100);
        assert_eq!(gen.next(), TaskId(100));
        assert_eq!(gen.next(), TaskId(101));
        gen.recycle(TaskId(100));
        assert_eq!(gen.next(), TaskId(102));
    }

    #[test]
    fn test_recycling_generator() {
        let gen = RecyclingGenerator::new(1);

        let id1 = gen.next();
        let id2 = gen.next();
        assert_eq!((id1, id2), (PeerId(1), PeerId(2)));

        gen.recycle(id1);
        assert_eq!(gen.next(), PeerId(1));
        assert_eq!(gen.next(), PeerId(3));
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskId(7).to_string(), "task#7");
        assert_eq!(PeerId(3).to_string(), "peer#3");
    }
}
