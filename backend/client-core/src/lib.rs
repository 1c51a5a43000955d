//! Application-side session with an inspector.
//!
//! An application builds a [`Client`], configures it with [`ClientOptions`]
//! (which installs the feature plugins), and connects. Everything sent before
//! the handshake completes is queued and flushed in order once the session is
//! ready.

pub mod client;
pub mod custom_command;
pub mod error;
pub mod options;
pub mod plugin;
pub mod plugins;
pub mod socket;
pub mod stopwatch;

pub use client::{CLIENT_CORE_VERSION, Client, ConnectHandle, DisplayConfig, Phase, WeakClient};
pub use custom_command::{CustomCommand, CustomCommandHandle};
pub use error::ClientError;
pub use options::{ClientOptions, IdentityProvider, InMemoryIdentity, NoIdentity};
pub use plugin::{Capability, Plugin, PluginCreator, ReservedFeature};
pub use socket::{SocketConnection, SocketEvent, SocketFactory, SocketSink, WebSocketFactory};
pub use stopwatch::Stopwatch;

#[cfg(test)]
mod tests;
