/*!
 * Server
 *
 * Listening TCP/IPv4 socket that owns the peers it accepts. Peers are
 * addressed by recycled [`PeerId`]s and share the timed transfer layer
 * with [`Connection`](super::Connection).
 *
 * # Design
 * - **Unified Storage**: accepted streams live in one DashMap keyed by peer id
 * - **Lock-free ID recycling**: closed peer ids are reused via SegQueue
 * - **No blocking under the map lock**: transfers clone the stream handle out first
 */

use super::config::NetConfig;
use super::readiness::can_read;
use super::socket::{listener, tune_accepted};
use super::transfer::{recv_reliable, send_reliable};
use super::types::{ensure_supported, ComMode, ComProtocol, ServerAttributes};
use crate::core::errors::{ModuleId, OsaError, OsaResult};
use crate::core::id::{IdGenerator, PeerId, RecyclingGenerator};
use crate::core::sync::Timeout;
use crate::core::types::{Outcome, Size};
use crate::monitoring::sink::{emit, LogLevel, SharedSink};
use crate::monitoring::span_operation;
use ahash::RandomState;
use dashmap::DashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::Arc;

const MODULE: ModuleId = ModuleId::Server;

/// Accepted connection owned by a server
struct Peer {
    stream: Arc<TcpStream>,
    addr: SocketAddr,
}

/// Listening server
pub struct Server {
    listener: TcpListener,
    attributes: ServerAttributes,
    config: NetConfig,
    peers: DashMap<PeerId, Peer, RandomState>,
    ids: RecyclingGenerator,
    sink: Option<SharedSink>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listener", &self.listener)
            .field("attributes", &self.attributes)
            .field("peers", &self.peers.len())
            .finish()
    }
}

impl Server {
    /// Bind and listen according to `attributes`
    pub fn create(
        mode: ComMode,
        protocol: ComProtocol,
        attributes: ServerAttributes,
        config: NetConfig,
        sink: Option<SharedSink>,
    ) -> OsaResult<Self> {
        ensure_supported(MODULE, mode, protocol)?;

        let backlog = match attributes.max_count {
            0 => config.default_backlog,
            n => n,
        };
        let addr = SocketAddrV4::new(attributes.address, attributes.port);
        let listener = listener(addr, backlog)?;
        let bound = listener
            .local_addr()
            .map_err(|e| OsaError::io(MODULE, &e))?;
        tracing::info!(addr = %bound, backlog, "server listening");

        Ok(Self {
            listener,
            attributes,
            config,
            peers: DashMap::with_hasher(RandomState::new()),
            ids: RecyclingGenerator::new(1),
            sink,
        })
    }

    /// Accept one pending connection if one arrives within `timeout`
    pub fn probe(&self, timeout: Timeout) -> OsaResult<Outcome<PeerId>> {
        let span = span_operation("server_probe");
        let _guard = span.enter();

        if can_read(&self.listener, timeout)
            .map_err(|e| e.in_module(MODULE))?
            .is_pending()
        {
            span.record_result("pending");
            return Ok(Outcome::Pending);
        }

        let (stream, addr) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                span.record_result("pending");
                return Ok(Outcome::Pending);
            }
            Err(e) => {
                let err = OsaError::io(MODULE, &e);
                span.record_error(&err);
                emit(self.sink.as_ref(), LogLevel::Error, format!("accept failed: {}", err));
                return Err(err);
            }
        };

        tune_accepted(
            &stream,
            self.config.socket_buf_size,
            self.config.accepted_send_timeout,
        )?;

        let id = self.ids.next();
        self.peers.insert(
            id,
            Peer {
                stream: Arc::new(stream),
                addr,
            },
        );
        span.record_result("ready");
        tracing::debug!(peer = %id, %addr, "connection accepted");
        Ok(Outcome::Ready(id))
    }

    /// Send all of `buf` to `peer` within `timeout`
    pub fn send(&self, peer: PeerId, buf: &[u8], timeout: Timeout) -> OsaResult<Outcome<Size>> {
        let stream = self.stream(peer)?;
        let result = send_reliable(&mut &*stream, buf, timeout).map_err(|e| e.in_module(MODULE));
        self.report(peer, "send", buf.len(), &result);
        result
    }

    /// Fill `buf` from `peer` within `timeout`
    pub fn recv(&self, peer: PeerId, buf: &mut [u8], timeout: Timeout) -> OsaResult<Outcome<Size>> {
        let stream = self.stream(peer)?;
        let requested = buf.len();
        let result = recv_reliable(&mut &*stream, buf, timeout).map_err(|e| e.in_module(MODULE));
        self.report(peer, "recv", requested, &result);
        result
    }

    /// Close one peer and release its id
    pub fn close_peer(&self, peer: PeerId) -> OsaResult<()> {
        let (_, removed) = self
            .peers
            .remove(&peer)
            .ok_or_else(|| unknown_peer(peer))?;
        self.ids.recycle(peer);
        shutdown_quietly(&removed.stream);
        tracing::debug!(peer = %peer, addr = %removed.addr, "peer closed");
        Ok(())
    }

    pub fn peer_addr(&self, peer: PeerId) -> OsaResult<SocketAddr> {
        self.peers
            .get(&peer)
            .map(|p| p.addr)
            .ok_or_else(|| unknown_peer(peer))
    }

    #[inline]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn local_addr(&self) -> OsaResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| OsaError::io(MODULE, &e))
    }

    #[inline]
    pub fn attributes(&self) -> &ServerAttributes {
        &self.attributes
    }

    /// Close the listener and every peer
    pub fn delete(self) -> OsaResult<()> {
        let closed = self.peers.len();
        for entry in self.peers.iter() {
            shutdown_quietly(&entry.value().stream);
        }
        self.peers.clear();
        tracing::info!(closed_peers = closed, "server deleted");
        Ok(())
    }

    fn stream(&self, peer: PeerId) -> OsaResult<Arc<TcpStream>> {
        self.peers
            .get(&peer)
            .map(|p| Arc::clone(&p.stream))
            .ok_or_else(|| unknown_peer(peer))
    }

    fn report(&self, peer: PeerId, op: &str, requested: usize, result: &OsaResult<Outcome<Size>>) {
        match result {
            Ok(Outcome::Ready(n)) if *n < requested => emit(
                self.sink.as_ref(),
                LogLevel::Warning,
                format!("{} {} timed out after {}/{} bytes", peer, op, n, requested),
            ),
            Ok(Outcome::Pending) => emit(
                self.sink.as_ref(),
                LogLevel::Warning,
                format!("{} {} timed out with no progress", peer, op),
            ),
            Err(e) => emit(
                self.sink.as_ref(),
                LogLevel::Error,
                format!("{} {} failed: {}", peer, op, e),
            ),
            Ok(Outcome::Ready(_)) => {}
        }
    }
}

fn unknown_peer(peer: PeerId) -> OsaError {
    OsaError::invalid_handle(MODULE, format!("unknown {}", peer))
}

fn shutdown_quietly(stream: &TcpStream) {
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        if e.kind() != ErrorKind::NotConnected {
            tracing::debug!(error = %e, "peer shutdown failed");
        }
    }
}
