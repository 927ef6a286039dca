/*!
 * Message Queue
 *
 * Bounded mailbox over a pre-allocated slot pool. One lock guards the pool;
 * two condition variables sit on it:
 *
 * - `not_full`: senders wait here while every slot is in flight
 * - `not_empty`: receivers wait here while nothing is queued
 *
 * A full queue is backpressure, not an error: `send` blocks or reports
 * `Pending` according to its timeout.
 */

use super::pool::SlotPool;
use super::types::{slot_size, MessagePriority, QueueStats};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::limits::{MAX_MESSAGE_SIZE, MAX_QUEUE_CAPACITY};
use crate::core::sync::wait::{wait_until, Condition, WaitStatus};
use crate::core::sync::Timeout;
use crate::core::types::{Outcome, Size};
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct QueueInner {
    pool: SlotPool,
    alive: bool,
    sent: u64,
    received: u64,
    send_timeouts: u64,
    receive_timeouts: u64,
}

/// Bounded, priority-aware message queue
///
/// # Example
///
/// ```
/// use osa_kernel::core::sync::Timeout;
/// use osa_kernel::ipc::queue::{MessagePriority, MessageQueue};
///
/// let queue = MessageQueue::create(4, 32).unwrap();
/// queue.send(b"hello", Timeout::NoWait, MessagePriority::Normal).unwrap();
///
/// let mut buf = [0u8; 32];
/// let n = queue.receive(&mut buf, Timeout::NoWait).unwrap().ready().unwrap();
/// assert_eq!(&buf[..n], b"hello");
/// ```
#[derive(Debug)]
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    max_len: usize,
}

impl MessageQueue {
    /// Allocate a queue of `capacity` slots holding at most `max_len` bytes each
    pub fn create(capacity: usize, max_len: usize) -> OsaResult<Self> {
        if capacity == 0 || max_len == 0 {
            return Err(OsaError::invalid_argument(
                ModuleId::Osa,
                "queue capacity and message length must be non-zero",
            ));
        }
        if capacity > MAX_QUEUE_CAPACITY || max_len > MAX_MESSAGE_SIZE {
            return Err(OsaError::out_of_range(
                ModuleId::Osa,
                format!(
                    "queue {}x{} exceeds {}x{}",
                    capacity, max_len, MAX_QUEUE_CAPACITY, MAX_MESSAGE_SIZE
                ),
            ));
        }

        tracing::debug!(capacity, max_len, slot_size = slot_size(max_len), "message queue created");

        Ok(Self {
            inner: Mutex::new(QueueInner {
                pool: SlotPool::new(capacity, max_len),
                alive: true,
                sent: 0,
                received: 0,
                send_timeouts: 0,
                receive_timeouts: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            max_len,
        })
    }

    /// Queue a copy of `payload`
    ///
    /// Oversized payloads fail before any blocking. Returns `Ready(len)` once
    /// queued, `Pending` if no slot freed up before the deadline.
    pub fn send(
        &self,
        payload: &[u8],
        timeout: Timeout,
        priority: MessagePriority,
    ) -> OsaResult<Outcome<Size>> {
        if payload.len() > self.max_len {
            return Err(OsaError::invalid_argument(
                ModuleId::Osa,
                format!("message of {} bytes exceeds {}", payload.len(), self.max_len),
            ));
        }

        let deadline = timeout.deadline();
        let mut inner = self.inner.lock();
        let status = wait_until(&self.not_full, &mut inner, deadline, |q| {
            if !q.alive {
                Condition::Gone
            } else if q.pool.enqueue(payload, priority) {
                Condition::Ready
            } else {
                Condition::Blocked
            }
        });

        match status {
            WaitStatus::Ready => {
                inner.sent += 1;
                self.not_empty.notify_one();
                tracing::trace!(len = payload.len(), ?priority, "message queued");
                Ok(Outcome::Ready(payload.len()))
            }
            WaitStatus::TimedOut => {
                inner.send_timeouts += 1;
                Ok(Outcome::Pending)
            }
            WaitStatus::Gone => Err(dead()),
        }
    }

    /// Take the next message into `buf`
    ///
    /// Copies `min(message length, buf.len())` bytes; the rest of a longer
    /// message is dropped. Returns `Ready(copied)` or `Pending` on timeout.
    pub fn receive(&self, buf: &mut [u8], timeout: Timeout) -> OsaResult<Outcome<Size>> {
        let mut copied = 0;
        let status = self.take(timeout, |pool| match pool.dequeue_into(buf) {
            Some(n) => {
                copied = n;
                true
            }
            None => false,
        })?;
        Ok(status.map(|()| copied))
    }

    /// Take the next message as an owned buffer
    pub fn receive_vec(&self, timeout: Timeout) -> OsaResult<Outcome<Vec<u8>>> {
        let mut message = None;
        let status = self.take(timeout, |pool| {
            message = pool.dequeue_vec();
            message.is_some()
        })?;
        Ok(match (status, message) {
            (Outcome::Ready(()), Some(data)) => Outcome::Ready(data),
            _ => Outcome::Pending,
        })
    }

    fn take<F>(&self, timeout: Timeout, mut dequeue: F) -> OsaResult<Outcome<()>>
    where
        F: FnMut(&mut SlotPool) -> bool,
    {
        let deadline = timeout.deadline();
        let mut inner = self.inner.lock();
        let status = wait_until(&self.not_empty, &mut inner, deadline, |q| {
            if !q.alive {
                Condition::Gone
            } else if dequeue(&mut q.pool) {
                Condition::Ready
            } else {
                Condition::Blocked
            }
        });

        match status {
            WaitStatus::Ready => {
                inner.received += 1;
                self.not_full.notify_one();
                Ok(Outcome::Ready(()))
            }
            WaitStatus::TimedOut => {
                inner.receive_timeouts += 1;
                Ok(Outcome::Pending)
            }
            WaitStatus::Gone => Err(dead()),
        }
    }

    /// Messages currently queued
    pub fn count(&self) -> OsaResult<Size> {
        let inner = self.inner.lock();
        if !inner.alive {
            return Err(dead());
        }
        Ok(inner.pool.queued())
    }

    pub fn free_slots(&self) -> OsaResult<Size> {
        let inner = self.inner.lock();
        if !inner.alive {
            return Err(dead());
        }
        Ok(inner.pool.free())
    }

    /// Payload lengths of queued messages in delivery order
    pub fn pending_lengths(&self) -> OsaResult<Vec<Size>> {
        let inner = self.inner.lock();
        if !inner.alive {
            return Err(dead());
        }
        Ok(inner.pool.queued_lengths())
    }

    #[inline]
    pub fn capacity(&self) -> Size {
        self.capacity
    }

    #[inline]
    pub fn max_message_len(&self) -> Size {
        self.max_len
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            capacity: self.capacity,
            max_message_len: self.max_len,
            slot_size: slot_size(self.max_len),
            pool_bytes: inner.pool.allocated_bytes(),
            queued: inner.pool.queued(),
            free: inner.pool.free(),
            sent: inner.sent,
            received: inner.received,
            send_timeouts: inner.send_timeouts,
            receive_timeouts: inner.receive_timeouts,
            alive: inner.alive,
        }
    }

    /// Invalidate the queue; queued messages are dropped and every blocked
    /// sender and receiver returns `InvalidHandle`
    pub fn delete(&self) -> OsaResult<()> {
        let mut inner = self.inner.lock();
        if !inner.alive {
            return Err(dead());
        }
        inner.alive = false;
        let dropped = inner.pool.queued();
        self.not_full.notify_all();
        self.not_empty.notify_all();
        tracing::debug!(dropped, "message queue deleted");
        Ok(())
    }
}

fn dead() -> OsaError {
    OsaError::invalid_handle(ModuleId::Osa, "message queue deleted")
}
