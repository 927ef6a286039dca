/*!
 * Queue Types
 * Priority, sizing and statistics for message queues
 */

use crate::core::types::Size;
use serde::{Deserialize, Serialize};

/// Per-slot bookkeeping charged against the pool: the list link plus the payload length
pub const SLOT_HEADER_SIZE: usize = std::mem::size_of::<Option<usize>>() + std::mem::size_of::<usize>();

/// Delivery class of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    /// Appended behind everything already queued
    #[default]
    Normal,
    /// Delivered ahead of queued normal messages, behind earlier urgent ones
    Urgent,
}

/// Bytes one slot occupies: header plus payload, rounded up to pointer width
#[inline]
pub const fn slot_size(max_len: usize) -> usize {
    let align = std::mem::size_of::<usize>();
    (SLOT_HEADER_SIZE + max_len + align - 1) / align * align
}

/// Queue statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub capacity: Size,
    pub max_message_len: Size,
    pub slot_size: Size,
    pub pool_bytes: Size,
    pub queued: Size,
    pub free: Size,
    pub sent: u64,
    pub received: u64,
    pub send_timeouts: u64,
    pub receive_timeouts: u64,
    pub alive: bool,
}
