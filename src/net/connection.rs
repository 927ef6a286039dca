/*!
 * Connection
 *
 * Outbound TCP/IPv4 client. The socket is non-blocking from creation and the
 * connect runs as a small state machine driven by repeated `do_work` calls:
 *
 * - `Pending`: connect still in progress; call again
 * - `Ready(())`: connected, the endpoint's `connected` flag is set
 * - `Err`: the connect failed; the socket is replaced so the object can retry
 */

use super::config::NetConfig;
use super::readiness::can_write;
use super::socket::{client_stream, start_connect};
use super::transfer::{recv_reliable, send_reliable};
use super::types::{ensure_supported, ComMode, ComProtocol, Endpoint};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::sync::Timeout;
use crate::core::types::{Outcome, Size};
use crate::monitoring::sink::{emit, LogLevel, SharedSink};
use crate::monitoring::span_operation;
use nix::errno::Errno;
use std::net::{Shutdown, SocketAddr, TcpStream};

const MODULE: ModuleId = ModuleId::Connection;

/// Outbound client socket
pub struct Connection {
    stream: TcpStream,
    mode: ComMode,
    protocol: ComProtocol,
    config: NetConfig,
    connected: bool,
    sink: Option<SharedSink>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.stream)
            .field("mode", &self.mode)
            .field("protocol", &self.protocol)
            .field("connected", &self.connected)
            .finish()
    }
}

impl Connection {
    /// Open a non-blocking socket for `(mode, protocol)`
    ///
    /// Only network TCP/IPv4 is implemented.
    pub fn create(
        mode: ComMode,
        protocol: ComProtocol,
        config: NetConfig,
        sink: Option<SharedSink>,
    ) -> OsaResult<Self> {
        ensure_supported(MODULE, mode, protocol)?;
        let stream = client_stream(config.client_send_timeout)?;
        Ok(Self {
            stream,
            mode,
            protocol,
            config,
            connected: false,
            sink,
        })
    }

    /// Drive the connect to `endpoint` forward
    pub fn do_work(&mut self, endpoint: &mut Endpoint, timeout: Timeout) -> OsaResult<Outcome<()>> {
        if self.connected {
            endpoint.connected = true;
            return Ok(Outcome::Ready(()));
        }

        let span = span_operation("connection_do_work");
        let _guard = span.enter();

        match start_connect(&self.stream, endpoint.socket_addr()) {
            Ok(()) | Err(Errno::EINPROGRESS) | Err(Errno::EALREADY) | Err(Errno::EINTR) => {}
            Err(Errno::EISCONN) => return Ok(self.mark_connected(endpoint)),
            Err(errno) => {
                let err = OsaError::errno(MODULE, errno);
                span.record_error(&err);
                return Err(self.fail(err));
            }
        }

        if can_write(&self.stream, timeout)
            .map_err(|e| e.in_module(MODULE))?
            .is_pending()
        {
            span.record_result("pending");
            return Ok(Outcome::Pending);
        }

        // writable either because the connect finished or because it failed
        match self.stream.take_error() {
            Ok(None) => {}
            Ok(Some(e)) | Err(e) => {
                let err = OsaError::io(MODULE, &e);
                span.record_error(&err);
                return Err(self.fail(err));
            }
        }

        match self.stream.peer_addr() {
            Ok(_) => {
                span.record_result("ready");
                Ok(self.mark_connected(endpoint))
            }
            Err(e) if e.raw_os_error() == Some(libc::ENOTCONN) => {
                span.record_result("pending");
                Ok(Outcome::Pending)
            }
            Err(e) => Err(self.fail(OsaError::io(MODULE, &e))),
        }
    }

    /// Send all of `buf` within `timeout`
    pub fn send(&self, buf: &[u8], timeout: Timeout) -> OsaResult<Outcome<Size>> {
        self.ensure_connected()?;
        let result = send_reliable(&mut &self.stream, buf, timeout).map_err(|e| e.in_module(MODULE));
        self.report("send", buf.len(), &result);
        result
    }

    /// Fill `buf` within `timeout`
    pub fn recv(&self, buf: &mut [u8], timeout: Timeout) -> OsaResult<Outcome<Size>> {
        self.ensure_connected()?;
        let requested = buf.len();
        let result = recv_reliable(&mut &self.stream, buf, timeout).map_err(|e| e.in_module(MODULE));
        self.report("recv", requested, &result);
        result
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn peer_addr(&self) -> OsaResult<SocketAddr> {
        self.ensure_connected()?;
        self.stream.peer_addr().map_err(|e| OsaError::io(MODULE, &e))
    }

    pub fn local_addr(&self) -> OsaResult<SocketAddr> {
        self.stream.local_addr().map_err(|e| OsaError::io(MODULE, &e))
    }

    /// Close the socket
    pub fn delete(self) -> OsaResult<()> {
        if self.connected {
            match self.stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
                Err(e) => return Err(OsaError::io(MODULE, &e)),
            }
        }
        tracing::debug!(connected = self.connected, "connection deleted");
        Ok(())
    }

    fn mark_connected(&mut self, endpoint: &mut Endpoint) -> Outcome<()> {
        self.connected = true;
        endpoint.connected = true;
        tracing::debug!(peer = %endpoint, "connection established");
        Outcome::Ready(())
    }

    /// Log a hard connect failure and swap in a fresh socket for the retry
    fn fail(&mut self, err: OsaError) -> OsaError {
        emit(self.sink.as_ref(), LogLevel::Error, format!("connect failed: {}", err));
        match client_stream(self.config.client_send_timeout) {
            Ok(stream) => self.stream = stream,
            Err(e) => tracing::warn!(error = %e, "could not replace failed socket"),
        }
        err
    }

    fn ensure_connected(&self) -> OsaResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(OsaError::not_initialized(MODULE, "connection not established"))
        }
    }

    fn report(&self, op: &str, requested: usize, result: &OsaResult<Outcome<Size>>) {
        match result {
            Ok(Outcome::Ready(n)) if *n < requested => emit(
                self.sink.as_ref(),
                LogLevel::Warning,
                format!("{} timed out after {}/{} bytes", op, n, requested),
            ),
            Ok(Outcome::Pending) => emit(
                self.sink.as_ref(),
                LogLevel::Warning,
                format!("{} timed out with no progress", op),
            ),
            Err(e) => emit(
                self.sink.as_ref(),
                LogLevel::Error,
                format!("{} failed: {}", op, e),
            ),
            Ok(Outcome::Ready(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_unsupported_transport() {
        let err = Connection::create(ComMode::Usb, ComProtocol::Usb, NetConfig::default(), None)
            .unwrap_err();
        assert!(matches!(err, OsaError::NotImplemented { .. }));
        assert_eq!(err.code().module(), Some(ModuleId::Connection));
    }

    #[test]
    fn test_send_before_connect_not_initialized() {
        let conn = Connection::create(
            ComMode::Network,
            ComProtocol::TcpIp4,
            NetConfig::default(),
            None,
        )
        .unwrap();
        assert!(matches!(
            conn.send(b"x", Timeout::NoWait),
            Err(OsaError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_connects_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut conn = Connection::create(
            ComMode::Network,
            ComProtocol::TcpIp4,
            NetConfig::default(),
            None,
        )
        .unwrap();

        let mut endpoint = Endpoint::localhost(port);
        let mut ready = false;
        for _ in 0..50 {
            if conn.do_work(&mut endpoint, Timeout::Millis(100)).unwrap().is_ready() {
                ready = true;
                break;
            }
        }
        assert!(ready);
        assert!(endpoint.connected);
        assert!(conn.is_connected());
        assert_eq!(conn.peer_addr().unwrap().port(), port);
        conn.delete().unwrap();
    }
}
