use crate::command_type::CommandType;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope as an application puts it on the wire.
///
/// The server stamps receipt metadata on top of this to build a [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub command_type: CommandType,

    #[serde(default)]
    pub payload: Value,

    #[serde(default)]
    pub important: bool,

    /// RFC 3339 timestamp taken by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Milliseconds since the sender's previous envelope, never negative.
    #[serde(default)]
    pub delta_time: u64,
}

/// An envelope after the server has received it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    #[serde(rename = "type")]
    pub command_type: CommandType,

    pub payload: Value,

    pub important: bool,

    #[serde(with = "crate::codec::rfc3339")]
    pub date: SystemTime,

    pub delta_time: u64,

    /// Receipt sequence number, unique for the life of the server process.
    pub message_id: u64,

    /// Physical socket the envelope arrived on.
    pub connection_id: u64,

    /// Logical client the socket belongs to, once its handshake completed.
    pub client_id: Option<String>,
}

/// Server-to-client message: control messages and inspector commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub command_type: CommandType,

    #[serde(default)]
    pub payload: Value,
}

impl ServerMessage {
    pub fn new(command_type: impl Into<CommandType>, payload: Value) -> Self {
        Self {
            command_type: command_type.into(),
            payload,
        }
    }
}
