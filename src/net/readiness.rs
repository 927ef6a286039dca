/*!
 * Readiness Probes
 *
 * Bounded wait for a descriptor to become readable or writable, without
 * moving any data. Built on poll(2):
 *
 * - `Ready`: the descriptor is ready, or in an error/hangup state (the
 *   following transfer surfaces the error)
 * - `Pending`: the deadline passed, or a signal interrupted the wait
 * - `Err`: poll itself failed
 */

use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::sync::cancel;
use crate::core::sync::{Deadline, Timeout};
use crate::core::types::Outcome;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::AsFd;
use std::time::Duration;

/// Which readiness a probe waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    fn flags(self) -> PollFlags {
        match self {
            Self::Read => PollFlags::POLLIN,
            Self::Write => PollFlags::POLLOUT,
        }
    }
}

/// Wait until `fd` can be read without blocking
pub fn can_read<F: AsFd>(fd: &F, timeout: Timeout) -> OsaResult<Outcome<()>> {
    probe(fd, Interest::Read, timeout.deadline())
}

/// Wait until `fd` can be written without blocking
pub fn can_write<F: AsFd>(fd: &F, timeout: Timeout) -> OsaResult<Outcome<()>> {
    probe(fd, Interest::Write, timeout.deadline())
}

/// Single probe against an already fixed deadline
///
/// On a task thread the poll is cut into slices so a cancel can unwind it.
pub fn probe<F: AsFd>(fd: &F, interest: Interest, deadline: Deadline) -> OsaResult<Outcome<()>> {
    let wanted = interest.flags();
    let token = cancel::current();

    loop {
        let left = deadline.remaining();
        let blocking = left.map_or(true, |left| !left.is_zero());
        let slice = if blocking {
            cancel::slice(token.as_deref())
        } else {
            None
        };
        let sliced = match (slice, left) {
            (Some(slice), Some(left)) => slice < left,
            (Some(_), None) => true,
            (None, _) => false,
        };

        let mut fds = [PollFd::new(fd.as_fd(), wanted)];
        match poll(&mut fds, poll_timeout(if sliced { slice } else { left })) {
            Ok(0) if sliced => continue,
            Ok(0) => return Ok(Outcome::Pending),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
                let failed = PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL;
                return if revents.intersects(wanted | failed) {
                    Ok(Outcome::Ready(()))
                } else {
                    Ok(Outcome::Pending)
                };
            }
            Err(Errno::EINTR) => return Ok(Outcome::Pending),
            Err(errno) => return Err(OsaError::errno(ModuleId::Net, errno)),
        }
    }
}

/// `None` blocks without limit
fn poll_timeout(wait: Option<Duration>) -> PollTimeout {
    match wait {
        None => PollTimeout::NONE,
        Some(wait) if wait.is_zero() => PollTimeout::ZERO,
        // round up so a sub-millisecond remainder does not spin
        Some(wait) => PollTimeout::try_from(wait + Duration::from_nanos(999_999))
            .unwrap_or(PollTimeout::MAX),
    }
}
