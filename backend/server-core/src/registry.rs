//! Bookkeeping for every socket the inspector has accepted.
//!
//! The registry is plain data: it assigns ids, runs the handshake rules and
//! reports what the caller must do on the wire as [`Effect`]s. The actor in
//! [`crate::state`] owns the only instance, so no locking happens here.

use protocol::codec::parse_date;
use protocol::state::StateValuesChangePayload;
use protocol::{Command, CommandType, Envelope};

use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use serde::Serialize;
use serde_json::{Map, Value};

pub type ConnectionId = u64;

/// Keys a handshake payload cannot override on the connection record.
const RESERVED_INTRO_KEYS: [&str; 3] = ["id", "address", "clientId"];

/// A socket that has not completed its handshake yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConnection {
    pub id: ConnectionId,
    pub address: Option<String>,
}

/// A socket past its `client.intro`, carrying the handshake metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub client_id: String,
    pub address: Option<String>,
    #[serde(flatten)]
    pub intro: Map<String, Value>,
}

impl Connection {
    pub fn name(&self) -> Option<&str> {
        self.intro.get("name").and_then(Value::as_str)
    }
}

/// Wire work the owner of the sockets has to carry out after a receipt.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Push a freshly minted id to the socket that introduced itself without one.
    SetClientId {
        connection_id: ConnectionId,
        client_id: String,
    },
    /// Close a socket superseded by a newer handshake for the same client.
    CloseStale(ConnectionId),
    /// A handshake completed.
    Established(Connection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub command: Command,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Default)]
struct Socket {
    address: Option<String>,
    client_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_connection_id: ConnectionId,
    message_id: u64,
    sockets: BTreeMap<ConnectionId, Socket>,
    partials: BTreeMap<ConnectionId, PartialConnection>,
    connections: BTreeMap<ConnectionId, Connection>,
    by_client: HashMap<String, ConnectionId>,
    subscriptions: Vec<String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a freshly accepted socket as a partial connection.
    pub fn accept(&mut self, address: Option<String>) -> PartialConnection {
        let id = self.next_connection_id;
        self.next_connection_id += 1;

        self.sockets.insert(
            id,
            Socket {
                address: address.clone(),
                client_id: None,
            },
        );

        let partial = PartialConnection { id, address };
        self.partials.insert(id, partial.clone());
        partial
    }

    /// Stamps an inbound envelope and applies its side effects.
    ///
    /// `mint` is only called for a handshake that carries no client id.
    pub fn receive(
        &mut self,
        connection_id: ConnectionId,
        envelope: Envelope,
        received_at: SystemTime,
        mint: impl FnOnce() -> String,
    ) -> Receipt {
        self.message_id += 1;

        let date = envelope
            .date
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(received_at);

        let mut command = Command {
            command_type: envelope.command_type,
            payload: envelope.payload,
            important: envelope.important,
            date,
            delta_time: envelope.delta_time,
            message_id: self.message_id,
            connection_id,
            client_id: self
                .sockets
                .get(&connection_id)
                .and_then(|socket| socket.client_id.clone()),
        };

        let mut effects = Vec::new();
        let kind = command.command_type.clone();

        match kind {
            CommandType::ClientIntro => self.introduce(&mut command, mint, &mut effects),
            CommandType::StateValuesChange => {
                self.subscriptions =
                    serde_json::from_value::<StateValuesChangePayload>(command.payload.clone())
                        .map(|payload| payload.paths())
                        .unwrap_or_default();
            }
            CommandType::StateBackupResponse => {
                // Consumers assign the backup name themselves.
                if let Value::Object(payload) = &mut command.payload {
                    payload.insert("name".to_string(), Value::Null);
                }
            }
            _ => {}
        }

        Receipt { command, effects }
    }

    fn introduce(
        &mut self,
        command: &mut Command,
        mint: impl FnOnce() -> String,
        effects: &mut Vec<Effect>,
    ) {
        let id = command.connection_id;
        let address = self
            .sockets
            .get(&id)
            .and_then(|socket| socket.address.clone());

        self.partials.remove(&id);

        if let Value::Object(payload) = &mut command.payload {
            payload.insert(
                "address".to_string(),
                address.clone().map(Value::String).unwrap_or(Value::Null),
            );
        }

        let supplied = command
            .payload
            .get("clientId")
            .and_then(Value::as_str)
            .filter(|client_id| !client_id.is_empty())
            .map(str::to_string);

        let client_id = match supplied {
            None => {
                let minted = mint();
                effects.push(Effect::SetClientId {
                    connection_id: id,
                    client_id: minted.clone(),
                });
                minted
            }
            Some(client_id) => {
                let stale: Vec<ConnectionId> = self
                    .sockets
                    .iter()
                    .filter(|(other, socket)| {
                        **other != id && socket.client_id.as_deref() == Some(client_id.as_str())
                    })
                    .map(|(other, _)| *other)
                    .collect();
                effects.extend(stale.into_iter().map(Effect::CloseStale));

                if let Some(previous) = self.by_client.get(&client_id).copied()
                    && previous != id
                {
                    self.connections.remove(&previous);
                }

                client_id
            }
        };

        if let Some(socket) = self.sockets.get_mut(&id) {
            socket.client_id = Some(client_id.clone());
        }
        command.client_id = Some(client_id.clone());

        let mut intro = match &command.payload {
            Value::Object(payload) => payload.clone(),
            _ => Map::new(),
        };
        for key in RESERVED_INTRO_KEYS {
            intro.remove(key);
        }

        let connection = Connection {
            id,
            client_id: client_id.clone(),
            address,
            intro,
        };

        if let Some(replaced) = self.connections.insert(id, connection.clone())
            && replaced.client_id != client_id
            && self.by_client.get(&replaced.client_id) == Some(&id)
        {
            self.by_client.remove(&replaced.client_id);
        }
        self.by_client.insert(client_id, id);

        effects.push(Effect::Established(connection));
    }

    /// Forgets a closed socket. Returns its connection if it had completed a handshake.
    pub fn close(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.sockets.remove(&connection_id);
        self.partials.remove(&connection_id);

        let connection = self.connections.remove(&connection_id)?;
        if self.by_client.get(&connection.client_id) == Some(&connection_id) {
            self.by_client.remove(&connection.client_id);
        }
        Some(connection)
    }

    /// Open sockets an outbound message goes to: all of them, or those tagged with `client_id`.
    pub fn targets(&self, client_id: Option<&str>) -> Vec<ConnectionId> {
        self.sockets
            .iter()
            .filter(|(_, socket)| match client_id {
                None => true,
                Some(wanted) => socket.client_id.as_deref() == Some(wanted),
            })
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.connections.values().cloned().collect()
    }

    pub fn partial_connections(&self) -> Vec<PartialConnection> {
        self.partials.values().cloned().collect()
    }

    pub fn connection_for(&self, client_id: &str) -> Option<&Connection> {
        self.by_client
            .get(client_id)
            .and_then(|id| self.connections.get(id))
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Id stamped on the most recent inbound message; 0 before any.
    pub fn last_message_id(&self) -> u64 {
        self.message_id
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }
}
