use protocol::DEFAULT_PORT;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Interval between keep-alive pings to every open socket.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Grace period before a socket superseded by a newer handshake is closed.
pub const DEFAULT_STALE_CLOSE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub port: u16,
    pub bind_address: IpAddr,
    pub keep_alive: Duration,
    pub stale_close_delay: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            keep_alive: DEFAULT_KEEP_ALIVE,
            stale_close_delay: DEFAULT_STALE_CLOSE_DELAY,
        }
    }
}

impl ServerOptions {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
