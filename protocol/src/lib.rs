//! Wire schema shared by the inspector and the applications it observes.
//!
//! This crate contains the envelope types exchanged over the session socket,
//! the registry of command type tags, the payload schemas the core itself
//! interprets, and the codec that turns envelopes into transport-safe text.
//!
//! ## Architecture
//!
//! - **protocol** (this crate): pure data + codec, no I/O
//! - **client-core**: application-side session state machine
//! - **server-core**: inspector-side connection registry

pub mod codec;
pub mod command_type;
pub mod custom_command;
pub mod envelope;
pub mod error;
pub mod network;
pub mod payload;
pub mod payloads;
pub mod state;

pub use codec::{decode, encode};
pub use command_type::CommandType;
pub use envelope::{Command, Envelope, ServerMessage};
pub use error::ProtocolError;
pub use payload::{Payload, SharedPayload};

/// Port the inspector listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 9600;
