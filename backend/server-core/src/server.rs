//! Inspector-side WebSocket server.
//!
//! The server accepts application sockets, hands every frame to the registry
//! actor, and writes whatever the actor routes back. Each accepted socket gets
//! two halves:
//!
//! - a reader task that forwards frames and reports the close
//! - a writer task draining an [`Outbound`] channel owned by the actor
//!
//! A keep-alive task pings every open socket on a fixed interval. It never
//! prunes: a socket leaves the registry only through its own close.

use crate::error::ServerError;
use crate::event::ServerEvent;
use crate::options::ServerOptions;
use crate::registry::{Connection, PartialConnection};
use crate::state::{Outbound, RegistryCommand, RegistryState};

use protocol::{CommandType, ServerMessage};

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

struct Running {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    keep_alive_task: JoinHandle<()>,
}

/// An inspector server. `Clone`; clones control the same listener and registry.
#[derive(Clone)]
pub struct Server {
    options: ServerOptions,
    state: RegistryState,
    running: Arc<Mutex<Option<Running>>>,
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            state: RegistryState::new(options.stale_close_delay),
            options,
            running: Arc::new(Mutex::new(None)),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Listens for events. Subscribe before [`Server::start`] to see `Start`.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.state.subscribe()
    }

    /// Binds the listener and starts accepting sockets.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// the configured port is 0. Starting a started server returns its address.
    ///
    /// # Errors
    ///
    /// - [`ServerError::PortUnavailable`] if the port is taken; a
    ///   [`ServerEvent::PortUnavailable`] is emitted as well
    /// - [`ServerError::Io`] for any other bind failure
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            warn!("Server already listening on {}", current.local_addr);
            return Ok(current.local_addr);
        }

        let address = self.options.socket_addr();
        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                warn!("Port {} is unavailable", self.options.port);
                self.state
                    .emit(ServerEvent::PortUnavailable(self.options.port));
                return Err(ServerError::port_unavailable(self.options.port));
            }
            Err(e) => return Err(e.into()),
        };
        let local_addr = listener.local_addr()?;

        info!("Inspector server listening on {}", local_addr);

        let state = self.state.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, addr)) = listener.accept().await {
                debug!("Socket connecting from {}", addr);
                tokio::spawn(handle_socket(stream, addr, state.clone()));
            }
        });
        let keep_alive_task = tokio::spawn(keep_alive(self.state.clone(), self.options.keep_alive));

        *running = Some(Running {
            local_addr,
            accept_task,
            keep_alive_task,
        });

        self.state.emit(ServerEvent::Start);
        Ok(local_addr)
    }

    /// Stops listening and closes every open socket. A no-op when not started.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        running.accept_task.abort();
        running.keep_alive_task.abort();
        self.state.update(RegistryCommand::CloseAll).await?;

        info!("Inspector server on {} stopped", running.local_addr);
        self.state.emit(ServerEvent::Stop);
        Ok(())
    }

    pub async fn is_started(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| running.local_addr)
    }

    /// Sends a command to every open socket, or only to those of `client_id`.
    ///
    /// Fire and forget: there is no acknowledgment.
    pub async fn send(
        &self,
        command_type: impl Into<CommandType>,
        payload: Value,
        client_id: Option<&str>,
    ) -> Result<(), ServerError> {
        self.state
            .update(RegistryCommand::Send {
                message: ServerMessage::new(command_type, payload),
                client_id: client_id.map(str::to_string),
            })
            .await
    }

    pub async fn connections(&self) -> Vec<Connection> {
        self.state.snapshot().await.connections
    }

    pub async fn partial_connections(&self) -> Vec<PartialConnection> {
        self.state.snapshot().await.partial_connections
    }

    /// State paths from the most recent `state.values.change`.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.state.snapshot().await.subscriptions
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerOptions::default())
    }
}

async fn keep_alive(state: RegistryState, period: Duration) {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = state.update(RegistryCommand::Ping).await {
            warn!("Keep-alive stopped: {}", e);
            break;
        }
    }
}

async fn handle_socket(stream: TcpStream, addr: SocketAddr, state: RegistryState) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    let connection_id = match state.accept(Some(addr.ip().to_string()), outbound_tx).await {
        Ok(partial) => partial.id,
        Err(e) => {
            warn!("Dropping socket from {}: {}", addr, e);
            return;
        }
    };

    tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            let result = match outbound {
                Outbound::Frame(text) => write.send(Message::Text(text.into())).await,
                Outbound::Ping => write.send(Message::Ping(Vec::new().into())).await,
                Outbound::Close => {
                    let _ = write.close().await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Write to connection {} failed: {}", connection_id, e);
                break;
            }
        }
    });

    while let Some(message) = read.next().await {
        let frame = match message {
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Read from connection {} failed: {}", connection_id, e);
                break;
            }
        };

        let received = RegistryCommand::Receive {
            connection_id,
            frame,
            received_at: SystemTime::now(),
        };
        if let Err(e) = state.update(received).await {
            warn!("Dropping frame from connection {}: {}", connection_id, e);
        }
    }

    if let Err(e) = state.update(RegistryCommand::Closed { connection_id }).await {
        warn!("Failed to record close of connection {}: {}", connection_id, e);
    }
}
