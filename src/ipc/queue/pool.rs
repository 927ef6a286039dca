/*!
 * Slot Pool
 *
 * Fixed arena of `capacity` message slots allocated once at creation.
 * Every slot is on exactly one of two lists: `free` (available) or `ready`
 * (holding a queued message). Urgent slots form a FIFO run at the front of
 * `ready`; `urgent_tail` marks its last slot. No concurrency here; the queue
 * wraps the pool in its lock.
 */

use super::list::SlotList;
use super::types::{slot_size, MessagePriority, SLOT_HEADER_SIZE};
use std::mem::size_of;

#[derive(Debug)]
pub(super) struct SlotPool {
    max_len: usize,
    /// Payload bytes per slot; with the header arrays a slot costs `slot_size(max_len)`
    stride: usize,
    storage: Box<[u8]>,
    lens: Box<[usize]>,
    links: Box<[Option<usize>]>,
    free: SlotList,
    ready: SlotList,
    urgent_tail: Option<usize>,
}

impl SlotPool {
    pub fn new(capacity: usize, max_len: usize) -> Self {
        let mut links = vec![None; capacity].into_boxed_slice();
        let mut free = SlotList::new();
        for idx in 0..capacity {
            free.push_tail(&mut links, idx);
        }

        let stride = slot_size(max_len) - SLOT_HEADER_SIZE;
        Self {
            max_len,
            stride,
            storage: vec![0u8; capacity * stride].into_boxed_slice(),
            lens: vec![0; capacity].into_boxed_slice(),
            links,
            free,
            ready: SlotList::new(),
            urgent_tail: None,
        }
    }

    /// Claim a free slot, copy `payload` into it and queue it
    ///
    /// Returns false when no slot is free. `payload` must fit `max_len`.
    pub fn enqueue(&mut self, payload: &[u8], priority: MessagePriority) -> bool {
        debug_assert!(payload.len() <= self.max_len);
        let Some(idx) = self.free.pop_head(&mut self.links) else {
            return false;
        };

        let start = idx * self.stride;
        self.storage[start..start + payload.len()].copy_from_slice(payload);
        self.lens[idx] = payload.len();

        match priority {
            MessagePriority::Normal => self.ready.push_tail(&mut self.links, idx),
            MessagePriority::Urgent => {
                match self.urgent_tail {
                    Some(last) => self.ready.insert_after(&mut self.links, last, idx),
                    None => self.ready.push_head(&mut self.links, idx),
                }
                self.urgent_tail = Some(idx);
            }
        }
        true
    }

    /// Take the next message, copy up to `out.len()` bytes of it and free its slot
    ///
    /// Returns the number of bytes copied, `None` when nothing is queued.
    pub fn dequeue_into(&mut self, out: &mut [u8]) -> Option<usize> {
        let idx = self.pop_ready()?;
        let n = self.lens[idx].min(out.len());
        let start = idx * self.stride;
        out[..n].copy_from_slice(&self.storage[start..start + n]);
        self.release(idx);
        Some(n)
    }

    /// Take the next message as an owned buffer
    pub fn dequeue_vec(&mut self) -> Option<Vec<u8>> {
        let idx = self.pop_ready()?;
        let start = idx * self.stride;
        let data = self.storage[start..start + self.lens[idx]].to_vec();
        self.release(idx);
        Some(data)
    }

    fn pop_ready(&mut self) -> Option<usize> {
        let idx = self.ready.pop_head(&mut self.links)?;
        if self.urgent_tail == Some(idx) {
            self.urgent_tail = None;
        }
        Some(idx)
    }

    fn release(&mut self, idx: usize) {
        self.lens[idx] = 0;
        self.free.push_tail(&mut self.links, idx);
    }

    /// Payload lengths in delivery order
    pub fn queued_lengths(&self) -> Vec<usize> {
        self.ready.iter(&self.links).map(|idx| self.lens[idx]).collect()
    }

    /// Bytes held by payload storage and per-slot bookkeeping
    pub fn allocated_bytes(&self) -> usize {
        self.storage.len()
            + self.lens.len() * size_of::<usize>()
            + self.links.len() * size_of::<Option<usize>>()
    }

    #[inline]
    pub fn queued(&self) -> usize {
        self.ready.count()
    }

    #[inline]
    pub fn free(&self) -> usize {
        self.free.count()
    }
}
