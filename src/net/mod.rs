/*!
 * Network Module
 * Readiness probes, timed transfers, outbound connections and listening servers
 *
 * Every blocking call takes a [`Timeout`](crate::core::sync::Timeout) and
 * answers with the tri-state `OsaResult<Outcome<_>>`, the same convention the
 * synchronization primitives use.
 */

pub mod config;
pub mod connection;
pub mod readiness;
pub mod server;
mod socket;
pub mod transfer;
pub mod types;

// Re-export for convenience
pub use config::NetConfig;
pub use connection::Connection;
pub use readiness::{can_read, can_write, Interest};
pub use server::Server;
pub use transfer::{
    recv_all, recv_reliable, recv_timeout, send_all, send_reliable, send_timeout,
};
pub use types::{ComMode, ComProtocol, Endpoint, ServerAttributes};
