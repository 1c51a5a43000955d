use crate::registry::{Connection, PartialConnection};

use protocol::Command;

/// Everything a server reports to its listeners.
///
/// Delivered over the server's own broadcast channel; a listener that lags
/// behind loses the oldest events.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Start,
    Stop,
    /// The configured port was already bound by another process.
    PortUnavailable(u16),
    /// A socket was accepted and is waiting for its handshake.
    Connect(PartialConnection),
    ConnectionEstablished(Connection),
    Disconnect(Connection),
    /// An inbound envelope, stamped with receipt metadata.
    Command(Command),
}
