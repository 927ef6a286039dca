/*!
 * Socket Setup
 * Thin nix wrappers for the socket options std does not expose
 */

use crate::core::errors::{ModuleId, OsaError, OsaResult};
use nix::sys::socket::{
    self, setsockopt, sockopt, AddressFamily, Backlog, SockFlag, SockType, SockaddrIn,
};
use std::net::{SocketAddrV4, TcpListener, TcpStream};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::time::Duration;

/// Fresh IPv4 stream socket
pub(crate) fn tcp4_socket(module: ModuleId) -> OsaResult<OwnedFd> {
    socket::socket(
        AddressFamily::Inet,
        SockType::Stream,
        SockFlag::empty(),
        None,
    )
    .map_err(|e| OsaError::errno(module, e))
}

/// Non-blocking outbound socket with an OS-level send timeout
pub(crate) fn client_stream(send_timeout: Duration) -> OsaResult<TcpStream> {
    let stream = TcpStream::from(tcp4_socket(ModuleId::Connection)?);
    stream
        .set_nonblocking(true)
        .map_err(|e| OsaError::io(ModuleId::Connection, &e))?;
    stream
        .set_write_timeout(non_zero(send_timeout))
        .map_err(|e| OsaError::io(ModuleId::Connection, &e))?;
    Ok(stream)
}

/// Non-blocking listener with SO_REUSEADDR, bound and listening
pub(crate) fn listener(addr: SocketAddrV4, backlog: u16) -> OsaResult<TcpListener> {
    let module = ModuleId::Server;
    let fd = tcp4_socket(module)?;
    setsockopt(&fd, sockopt::ReuseAddr, &true).map_err(|e| OsaError::errno(module, e))?;
    socket::bind(fd.as_raw_fd(), &SockaddrIn::from(addr)).map_err(|e| OsaError::errno(module, e))?;
    let backlog = Backlog::new(i32::from(backlog)).map_err(|e| OsaError::errno(module, e))?;
    socket::listen(&fd, backlog).map_err(|e| OsaError::errno(module, e))?;

    let listener = TcpListener::from(fd);
    listener
        .set_nonblocking(true)
        .map_err(|e| OsaError::io(module, &e))?;
    Ok(listener)
}

/// Buffer sizes, send timeout and non-blocking mode for an accepted socket
pub(crate) fn tune_accepted(stream: &TcpStream, buf_size: usize, send_timeout: Duration) -> OsaResult<()> {
    let module = ModuleId::Server;
    setsockopt(stream, sockopt::SndBuf, &buf_size).map_err(|e| OsaError::errno(module, e))?;
    setsockopt(stream, sockopt::RcvBuf, &buf_size).map_err(|e| OsaError::errno(module, e))?;
    stream
        .set_write_timeout(non_zero(send_timeout))
        .map_err(|e| OsaError::io(module, &e))?;
    stream
        .set_nonblocking(true)
        .map_err(|e| OsaError::io(module, &e))
}

/// Start a connect on a non-blocking socket
pub(crate) fn start_connect<F: AsFd>(fd: &F, addr: SocketAddrV4) -> nix::Result<()> {
    socket::connect(fd.as_fd().as_raw_fd(), &SockaddrIn::from(addr))
}

// std rejects a zero timeout; zero means "none" here
fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_listener_binds_ephemeral() {
        let listener = listener(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), 4).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_client_stream_has_send_timeout() {
        let stream = client_stream(Duration::from_millis(50)).unwrap();
        assert_eq!(
            stream.write_timeout().unwrap(),
            Some(Duration::from_millis(50))
        );
    }
}
