//! Socket abstraction the session state machine drives.
//!
//! The client never talks to a concrete websocket type. A [`SocketFactory`]
//! opens a link to a URL and hands back a writable [`SocketSink`] plus a
//! stream of [`SocketEvent`]s, so the same state machine runs on top of
//! tokio-tungstenite in production and on an in-memory script in tests.

pub mod websocket;

pub use websocket::WebSocketFactory;

use crate::error::TransportError;

use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

/// Something the link reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    /// A text or binary frame, as raw bytes.
    Message(Vec<u8>),
    /// The link is gone, cleanly or not. Always the last event.
    Close,
}

/// Write half of an open link.
pub trait SocketSink: Send + Sync {
    /// Queues one text frame for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the link can no longer be written.
    fn send(&self, frame: String) -> Result<(), TransportError>;

    fn close(&self);
}

pub struct SocketConnection {
    pub sink: Box<dyn SocketSink>,
    pub events: UnboundedReceiver<SocketEvent>,
}

/// Opens links on behalf of a client.
pub trait SocketFactory: Send + Sync {
    fn create(&self, url: &Url) -> SocketConnection;
}
