/*!
 * Timed Transfers
 *
 * Probe-then-transfer over any non-blocking descriptor (TCP streams, pipes).
 *
 * - `send_timeout` / `recv_timeout`: one probe, one attempt; a would-block
 *   after a positive probe is zero progress, not an error
 * - `send_reliable` / `recv_reliable`: retry until the whole buffer moved or
 *   the deadline passed; interrupted and would-block attempts are retried
 * - `send_all` / `recv_all`: the reliable loop with no deadline
 *
 * A read of 0 bytes on a non-empty buffer means the peer shut down and is
 * reported as `Closed`.
 */

use super::readiness::{probe, Interest};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::sync::{Deadline, Timeout};
use crate::core::types::{Outcome, Size};
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::AsFd;

/// Single readiness-checked write
pub fn send_timeout<W>(writer: &mut W, buf: &[u8], timeout: Timeout) -> OsaResult<Outcome<Size>>
where
    W: Write + AsFd,
{
    if buf.is_empty() {
        return Ok(Outcome::Ready(0));
    }
    if probe(writer, Interest::Write, timeout.deadline())?.is_pending() {
        return Ok(Outcome::Pending);
    }
    match write_once(writer, buf)? {
        Some(n) => Ok(Outcome::Ready(n)),
        None => Ok(Outcome::Pending),
    }
}

/// Single readiness-checked read
pub fn recv_timeout<R>(reader: &mut R, buf: &mut [u8], timeout: Timeout) -> OsaResult<Outcome<Size>>
where
    R: Read + AsFd,
{
    if buf.is_empty() {
        return Ok(Outcome::Ready(0));
    }
    if probe(reader, Interest::Read, timeout.deadline())?.is_pending() {
        return Ok(Outcome::Pending);
    }
    match read_once(reader, buf)? {
        Some(n) => Ok(Outcome::Ready(n)),
        None => Ok(Outcome::Pending),
    }
}

/// Write all of `buf` before the deadline
///
/// `Ready(buf.len())` on completion, `Ready(partial)` if the deadline hit
/// after some progress, `Pending` if nothing could be written.
pub fn send_reliable<W>(writer: &mut W, buf: &[u8], timeout: Timeout) -> OsaResult<Outcome<Size>>
where
    W: Write + AsFd,
{
    let deadline = timeout.deadline();
    let mut sent = 0;

    while sent < buf.len() {
        if !ready_before(writer, Interest::Write, &deadline)? {
            break;
        }
        if let Some(n) = write_once(writer, &buf[sent..])? {
            sent += n;
        }
    }

    tracing::trace!(sent, requested = buf.len(), "send_reliable finished");
    Ok(progress(sent, buf.len()))
}

/// Fill all of `buf` before the deadline; same results as [`send_reliable`]
pub fn recv_reliable<R>(
    reader: &mut R,
    buf: &mut [u8],
    timeout: Timeout,
) -> OsaResult<Outcome<Size>>
where
    R: Read + AsFd,
{
    let deadline = timeout.deadline();
    let mut received = 0;

    while received < buf.len() {
        if !ready_before(reader, Interest::Read, &deadline)? {
            break;
        }
        if let Some(n) = read_once(reader, &mut buf[received..])? {
            received += n;
        }
    }

    tracing::trace!(received, requested = buf.len(), "recv_reliable finished");
    Ok(progress(received, buf.len()))
}

/// Write all of `buf`, blocking as long as it takes
pub fn send_all<W>(writer: &mut W, buf: &[u8]) -> OsaResult<Size>
where
    W: Write + AsFd,
{
    Ok(send_reliable(writer, buf, Timeout::Forever)?
        .ready()
        .unwrap_or_default())
}

/// Fill all of `buf`, blocking as long as it takes
pub fn recv_all<R>(reader: &mut R, buf: &mut [u8]) -> OsaResult<Size>
where
    R: Read + AsFd,
{
    Ok(recv_reliable(reader, buf, Timeout::Forever)?
        .ready()
        .unwrap_or_default())
}

/// Probe until ready or the deadline passes; interrupted probes are retried
fn ready_before<F: AsFd>(fd: &F, interest: Interest, deadline: &Deadline) -> OsaResult<bool> {
    loop {
        if probe(fd, interest, *deadline)?.is_ready() {
            return Ok(true);
        }
        if deadline.is_expired() {
            return Ok(false);
        }
    }
}

fn progress(done: usize, requested: usize) -> Outcome<Size> {
    if done == 0 && requested > 0 {
        Outcome::Pending
    } else {
        Outcome::Ready(done)
    }
}

/// One write; `None` for transient conditions
fn write_once<W: Write>(writer: &mut W, buf: &[u8]) -> OsaResult<Option<usize>> {
    match writer.write(buf) {
        Ok(0) => Err(OsaError::closed(ModuleId::Net, "peer stopped accepting data")),
        Ok(n) => Ok(Some(n)),
        Err(e) if is_transient(&e) => Ok(None),
        Err(e) => Err(OsaError::io(ModuleId::Net, &e)),
    }
}

/// One read; `None` for transient conditions
fn read_once<R: Read>(reader: &mut R, buf: &mut [u8]) -> OsaResult<Option<usize>> {
    match reader.read(buf) {
        Ok(0) => Err(OsaError::closed(ModuleId::Net, "peer shut down")),
        Ok(n) => Ok(Some(n)),
        Err(e) if is_transient(&e) => Ok(None),
        Err(e) => Err(OsaError::io(ModuleId::Net, &e)),
    }
}

#[inline]
fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}
