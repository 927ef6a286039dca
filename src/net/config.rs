/*!
 * Network Configuration
 *
 * Socket tuning applied by connections and servers
 */

use crate::core::limits::{
    ACCEPTED_SEND_TIMEOUT, CLIENT_SEND_TIMEOUT, DEFAULT_BACKLOG, MAX_SOCKETBUF_SIZE,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Socket tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConfig {
    /// SO_SNDBUF / SO_RCVBUF applied to accepted sockets
    pub socket_buf_size: usize,
    /// OS-level send timeout on accepted sockets
    pub accepted_send_timeout: Duration,
    /// OS-level send timeout on outbound sockets
    pub client_send_timeout: Duration,
    /// Backlog used when the server attributes leave it at 0
    pub default_backlog: u16,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            socket_buf_size: MAX_SOCKETBUF_SIZE,
            accepted_send_timeout: ACCEPTED_SEND_TIMEOUT,
            client_send_timeout: CLIENT_SEND_TIMEOUT,
            default_backlog: DEFAULT_BACKLOG,
        }
    }
}

impl NetConfig {
    /// Defaults overridden by the environment
    ///
    /// Environment variables:
    /// - OSA_SOCKET_BUF: accepted socket buffer size in bytes
    /// - OSA_ACCEPT_SNDTIMEO_MS: accepted socket send timeout
    /// - OSA_CLIENT_SNDTIMEO_MS: outbound socket send timeout
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = env_value::<usize>("OSA_SOCKET_BUF") {
            config.socket_buf_size = size;
        }
        if let Some(ms) = env_value::<u64>("OSA_ACCEPT_SNDTIMEO_MS") {
            config.accepted_send_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value::<u64>("OSA_CLIENT_SNDTIMEO_MS") {
            config.client_send_timeout = Duration::from_millis(ms);
        }
        config
    }

    pub fn with_socket_buf_size(mut self, size: usize) -> Self {
        self.socket_buf_size = size;
        self
    }

    pub fn with_accepted_send_timeout(mut self, timeout: Duration) -> Self {
        self.accepted_send_timeout = timeout;
        self
    }

    pub fn with_client_send_timeout(mut self, timeout: Duration) -> Self {
        self.client_send_timeout = timeout;
        self
    }

    pub fn with_default_backlog(mut self, backlog: u16) -> Self {
        self.default_backlog = backlog;
        self
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable network setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = NetConfig::default();
        assert_eq!(config.socket_buf_size, 32_768);
        assert_eq!(config.accepted_send_timeout, Duration::from_secs(5));
        assert_eq!(config.client_send_timeout, Duration::from_millis(50));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("OSA_SOCKET_BUF", "65536");
        std::env::set_var("OSA_CLIENT_SNDTIMEO_MS", "not-a-number");
        let config = NetConfig::from_env();
        std::env::remove_var("OSA_SOCKET_BUF");
        std::env::remove_var("OSA_CLIENT_SNDTIMEO_MS");

        assert_eq!(config.socket_buf_size, 65_536);
        assert_eq!(config.client_send_timeout, CLIENT_SEND_TIMEOUT);
    }

    #[test]
    fn test_builders() {
        let config = NetConfig::default()
            .with_socket_buf_size(4096)
            .with_default_backlog(2);
        assert_eq!(config.socket_buf_size, 4096);
        assert_eq!(config.default_backlog, 2);
    }
}
