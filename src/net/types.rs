/*!
 * Network Types
 * Transport selection, endpoints and server attributes
 */

use crate::core::errors::{ModuleId, OsaError, OsaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Transport medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComMode {
    Network,
    Usb,
}

/// Protocol spoken over the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComProtocol {
    TcpIp4,
    TcpIp6,
    Usb,
}

/// Reject every (mode, protocol) pair except network TCP/IPv4
pub(crate) fn ensure_supported(
    module: ModuleId,
    mode: ComMode,
    protocol: ComProtocol,
) -> OsaResult<()> {
    match (mode, protocol) {
        (ComMode::Network, ComProtocol::TcpIp4) => Ok(()),
        _ => Err(OsaError::not_implemented(
            module,
            format!("{:?} over {:?}", protocol, mode),
        )),
    }
}

/// Remote peer a [`Connection`](super::Connection) connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub addr: Ipv4Addr,
    pub port: u16,
    /// Set by `do_work` once the connect completes
    pub connected: bool,
    /// Caller's forced-send preference, carried with the endpoint
    pub forced: bool,
}

impl Endpoint {
    pub const fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self {
            addr,
            port,
            connected: false,
            forced: false,
        }
    }

    pub const fn localhost(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port)
    }

    pub const fn with_forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    #[inline]
    pub const fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr, self.port)
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Listening server settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAttributes {
    /// Port to bind; 0 picks an ephemeral port
    pub port: u16,
    /// Listen backlog; 0 uses the configured default
    pub max_count: u16,
    pub address: Ipv4Addr,
}

impl ServerAttributes {
    pub const fn new(port: u16, max_count: u16) -> Self {
        Self {
            port,
            max_count,
            address: Ipv4Addr::UNSPECIFIED,
        }
    }

    pub const fn with_address(mut self, address: Ipv4Addr) -> Self {
        self.address = address;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_tcp4_supported() {
        assert!(ensure_supported(ModuleId::Server, ComMode::Network, ComProtocol::TcpIp4).is_ok());
        for (mode, prot) in [
            (ComMode::Network, ComProtocol::TcpIp6),
            (ComMode::Network, ComProtocol::Usb),
            (ComMode::Usb, ComProtocol::Usb),
            (ComMode::Usb, ComProtocol::TcpIp4),
        ] {
            let err = ensure_supported(ModuleId::Connection, mode, prot).unwrap_err();
            assert!(matches!(err, OsaError::NotImplemented { .. }));
            assert_eq!(err.module(), ModuleId::Connection);
        }
    }

    #[test]
    fn test_endpoint_display() {
        let ep = Endpoint::localhost(8080).with_forced(true);
        assert_eq!(ep.to_string(), "127.0.0.1:8080");
        assert!(ep.forced);
        assert!(!ep.connected);
    }
}
