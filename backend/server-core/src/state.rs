//! Registry state management using actor pattern.
//!
//! Socket tasks never touch the [`ConnectionRegistry`] directly. They send
//! [`RegistryCommand`]s to a single actor task which applies them in arrival
//! order, so connection ids, message ids and dedup decisions form one total
//! order across every client.
//!
//! Reads go through a snapshot behind `Arc<RwLock<_>>` that only the actor
//! writes.

use crate::error::ServerError;
use crate::event::ServerEvent;
use crate::registry::{Connection, ConnectionId, ConnectionRegistry, Effect, PartialConnection};

use protocol::{CommandType, Envelope, ServerMessage, decode, encode};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc, oneshot};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 100;

/// Work for the writer half of one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(String),
    Ping,
    Close,
}

/// Commands that mutate registry state.
#[derive(Debug)]
pub enum RegistryCommand {
    Accept {
        address: Option<String>,
        outbound: UnboundedSender<Outbound>,
        reply: oneshot::Sender<PartialConnection>,
    },
    Receive {
        connection_id: ConnectionId,
        frame: Vec<u8>,
        received_at: SystemTime,
    },
    Closed {
        connection_id: ConnectionId,
    },
    Send {
        message: ServerMessage,
        client_id: Option<String>,
    },
    Ping,
    CloseAll,
}

/// Read side of the registry, refreshed by the actor after every command.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub connections: Vec<Connection>,
    pub partial_connections: Vec<PartialConnection>,
    pub subscriptions: Vec<String>,
}

impl Snapshot {
    fn of(registry: &ConnectionRegistry) -> Self {
        Self {
            connections: registry.connections(),
            partial_connections: registry.partial_connections(),
            subscriptions: registry.subscriptions().to_vec(),
        }
    }
}

/// Handle to the registry actor.
///
/// `Clone`; all clones share the same actor, snapshot and event bus.
#[derive(Clone)]
pub struct RegistryState {
    command_tx: Arc<Mutex<Option<mpsc::Sender<RegistryCommand>>>>,
    actor_init: Arc<Mutex<bool>>,
    snapshot: Arc<RwLock<Snapshot>>,
    events: broadcast::Sender<ServerEvent>,
    stale_close_delay: Duration,
}

impl RegistryState {
    /// The actor is spawned lazily on first use within an async context.
    pub fn new(stale_close_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            actor_init: Arc::new(Mutex::new(false)),
            snapshot: Arc::new(RwLock::new(Snapshot::default())),
            events,
            stale_close_delay,
        }
    }

    /// # Errors
    ///
    /// Returns [`ServerError::Actor`] if the registry actor has died.
    pub async fn update(&self, cmd: RegistryCommand) -> Result<(), ServerError> {
        self.ensure_actor().await;

        let tx_guard = self.command_tx.lock().await;
        let tx = tx_guard
            .as_ref()
            .ok_or_else(|| ServerError::actor("Registry actor not initialized"))?;

        tx.send(cmd)
            .await
            .map_err(|e| ServerError::actor(format!("Registry actor died: {}", e)))
    }

    /// Registers a new socket and returns its partial connection.
    pub async fn accept(
        &self,
        address: Option<String>,
        outbound: UnboundedSender<Outbound>,
    ) -> Result<PartialConnection, ServerError> {
        let (reply, response) = oneshot::channel();
        self.update(RegistryCommand::Accept {
            address,
            outbound,
            reply,
        })
        .await?;

        response
            .await
            .map_err(|_| ServerError::actor("Registry actor dropped the accept reply"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: ServerEvent) {
        // No listeners is fine.
        let _ = self.events.send(event);
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);

            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(registry_actor(
                rx,
                Arc::clone(&self.snapshot),
                self.events.clone(),
                self.stale_close_delay,
            ));
            *init_guard = true;
            info!("Registry actor spawned");
        }
    }
}

/// Owns the registry and the writer channel of every socket.
///
/// Runs until every [`RegistryState`] handle is dropped.
async fn registry_actor(
    mut command_rx: mpsc::Receiver<RegistryCommand>,
    snapshot: Arc<RwLock<Snapshot>>,
    events: broadcast::Sender<ServerEvent>,
    stale_close_delay: Duration,
) {
    info!("Registry actor started");

    let mut registry = ConnectionRegistry::new();
    let mut sockets: HashMap<ConnectionId, UnboundedSender<Outbound>> = HashMap::new();
    let emit = |event: ServerEvent| {
        let _ = events.send(event);
    };

    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            RegistryCommand::Accept {
                address,
                outbound,
                reply,
            } => {
                let partial = registry.accept(address);
                info!(
                    "Connection {} accepted from {}",
                    partial.id,
                    partial.address.as_deref().unwrap_or("unknown address")
                );
                sockets.insert(partial.id, outbound);
                emit(ServerEvent::Connect(partial.clone()));
                let _ = reply.send(partial);
            }

            RegistryCommand::Receive {
                connection_id,
                frame,
                received_at,
            } => {
                let envelope = match decode::<Envelope>(&frame) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("Skipping malformed frame on connection {}: {}", connection_id, e);
                        continue;
                    }
                };

                let receipt = registry.receive(connection_id, envelope, received_at, || {
                    Uuid::new_v4().to_string()
                });

                for effect in receipt.effects {
                    match effect {
                        Effect::SetClientId {
                            connection_id,
                            client_id,
                        } => {
                            info!("Assigned client id {} to connection {}", client_id, connection_id);
                            let message =
                                ServerMessage::new(CommandType::SetClientId, Value::String(client_id));
                            deliver(&sockets, &[connection_id], &message);
                        }
                        Effect::CloseStale(stale) => {
                            if let Some(tx) = sockets.get(&stale).cloned() {
                                info!("Closing superseded connection {}", stale);
                                tokio::spawn(async move {
                                    tokio::time::sleep(stale_close_delay).await;
                                    let _ = tx.send(Outbound::Close);
                                });
                            }
                        }
                        Effect::Established(connection) => {
                            info!(
                                "Connection {} established for client {}",
                                connection.id, connection.client_id
                            );
                            emit(ServerEvent::ConnectionEstablished(connection));
                        }
                    }
                }

                debug!(
                    "Message {} ({}) from connection {}",
                    receipt.command.message_id, receipt.command.command_type, connection_id
                );
                emit(ServerEvent::Command(receipt.command));
            }

            RegistryCommand::Closed { connection_id } => {
                sockets.remove(&connection_id);
                match registry.close(connection_id) {
                    Some(connection) => {
                        info!(
                            "Connection {} for client {} disconnected",
                            connection.id, connection.client_id
                        );
                        emit(ServerEvent::Disconnect(connection));
                    }
                    None => debug!("Connection {} closed", connection_id),
                }
            }

            RegistryCommand::Send { message, client_id } => {
                let targets = registry.targets(client_id.as_deref());
                deliver(&sockets, &targets, &message);
            }

            RegistryCommand::Ping => {
                for tx in sockets.values() {
                    let _ = tx.send(Outbound::Ping);
                }
            }

            RegistryCommand::CloseAll => {
                info!("Closing {} socket(s)", sockets.len());
                for tx in sockets.values() {
                    let _ = tx.send(Outbound::Close);
                }
            }
        }

        *snapshot.write().await = Snapshot::of(&registry);
    }

    info!("Registry actor stopped");
}

fn deliver(
    sockets: &HashMap<ConnectionId, UnboundedSender<Outbound>>,
    targets: &[ConnectionId],
    message: &ServerMessage,
) {
    let frame = match encode(message) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Failed to encode {} message: {}", message.command_type, e);
            return;
        }
    };

    for id in targets {
        if let Some(tx) = sockets.get(id) {
            let _ = tx.send(Outbound::Frame(frame.clone()));
        }
    }
}
