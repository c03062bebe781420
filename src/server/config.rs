//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::media::codec::DEFAULT_MAX_PAYLOAD;

/// Default port for producer connections
pub const DEFAULT_INGEST_PORT: u16 = 7350;

/// Default port for viewer connections
pub const DEFAULT_VIEWER_PORT: u16 = 7351;

/// Relay server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address producers connect to
    pub ingest_addr: SocketAddr,

    /// Address viewers connect to
    pub viewer_addr: SocketAddr,

    /// Maximum concurrent connections across both listeners (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// The hello must arrive within this time
    pub handshake_timeout: Duration,

    /// Application-level read buffer size for producer connections
    pub read_buffer_size: usize,

    /// Largest frame payload accepted from producers
    pub max_payload: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ingest_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_INGEST_PORT)),
            viewer_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_VIEWER_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,
            handshake_timeout: Duration::from_secs(10),
            read_buffer_size: 256 * 1024,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ServerConfig {
    /// Set the producer listen address
    pub fn ingest_addr(mut self, addr: SocketAddr) -> Self {
        self.ingest_addr = addr;
        self
    }

    /// Set the viewer listen address
    pub fn viewer_addr(mut self, addr: SocketAddr) -> Self {
        self.viewer_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the producer read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the maximum accepted payload size
    pub fn max_payload(mut self, max: usize) -> Self {
        self.max_payload = max;
        self
    }
}
