//! Inspector side of the session protocol.
//!
//! A [`Server`] accepts application sockets, runs the `client.intro`
//! handshake, deduplicates sockets that share a client id, and fans commands
//! out to one client or all of them. Everything it observes is reported as
//! [`ServerEvent`]s on a broadcast channel owned by the server.

pub mod config;
pub mod error;
pub mod event;
pub mod options;
pub mod registry;
pub mod server;
pub mod state;

pub use config::InspectorConfig;
pub use error::{ConfigError, ServerError};
pub use event::ServerEvent;
pub use options::ServerOptions;
pub use registry::{Connection, ConnectionId, ConnectionRegistry, PartialConnection};
pub use server::Server;

#[cfg(test)]
mod tests;
