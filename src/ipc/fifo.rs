/*!
 * Byte FIFO
 *
 * Pipe-backed byte stream between tasks of one process. Unlike the message
 * queue it keeps no message boundaries: readers ask for an exact byte count.
 * The kernel pipe buffer bounds how much can be outstanding; `put` blocks
 * when it is full.
 */

use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::sync::Timeout;
use crate::core::types::{Outcome, Size};
use crate::net::transfer::recv_reliable;
use std::fs::File;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Byte FIFO over an OS pipe
#[derive(Debug)]
pub struct ByteFifo {
    reader: File,
    writer: File,
    count: AtomicUsize,
}

impl ByteFifo {
    pub fn create() -> OsaResult<Self> {
        let (read_end, write_end) =
            nix::unistd::pipe().map_err(|e| OsaError::errno(ModuleId::Osa, e))?;
        Ok(Self {
            reader: File::from(read_end),
            writer: File::from(write_end),
            count: AtomicUsize::new(0),
        })
    }

    /// Append all of `bytes`
    pub fn put(&self, bytes: &[u8]) -> OsaResult<()> {
        (&self.writer)
            .write_all(bytes)
            .map_err(|e| OsaError::io(ModuleId::Osa, &e))?;
        self.count.fetch_add(bytes.len(), Ordering::AcqRel);
        Ok(())
    }

    /// Read exactly `buf.len()` bytes, blocking until they arrive
    pub fn get(&self, buf: &mut [u8]) -> OsaResult<()> {
        (&self.reader)
            .read_exact(buf)
            .map_err(|e| OsaError::io(ModuleId::Osa, &e))?;
        self.consume(buf.len());
        Ok(())
    }

    /// Read up to `buf.len()` bytes before the deadline
    ///
    /// `Ready(n)` may be short if the deadline passed mid-read; the bytes
    /// returned are removed from the FIFO either way.
    pub fn get_timeout(&self, buf: &mut [u8], timeout: Timeout) -> OsaResult<Outcome<Size>> {
        let outcome = recv_reliable(&mut &self.reader, buf, timeout)
            .map_err(|e| e.in_module(ModuleId::Osa))?;
        if let Outcome::Ready(n) = outcome {
            self.consume(n);
        }
        Ok(outcome)
    }

    /// Bytes put but not yet read
    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn consume(&self, n: usize) {
        // never below zero
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(n)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_get_preserves_order() {
        let fifo = ByteFifo::create().unwrap();
        fifo.put(b"abc").unwrap();
        fifo.put(b"def").unwrap();
        assert_eq!(fifo.count(), 6);

        let mut buf = [0u8; 4];
        fifo.get(&mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
        assert_eq!(fifo.count(), 2);
    }

    #[test]
    fn test_get_timeout_on_empty() {
        let fifo = ByteFifo::create().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(
            fifo.get_timeout(&mut buf, Timeout::Millis(10)).unwrap(),
            Outcome::Pending
        );
        assert_eq!(fifo.count(), 0);
    }

    #[test]
    fn test_get_blocks_until_put() {
        let fifo = Arc::new(ByteFifo::create().unwrap());
        let reader = {
            let fifo = Arc::clone(&fifo);
            thread::spawn(move || {
                let mut buf = [0u8; 5];
                fifo.get(&mut buf).map(|()| buf)
            })
        };
        fifo.put(b"hello").unwrap();
        assert_eq!(&reader.join().unwrap().unwrap(), b"hello");
    }
}
