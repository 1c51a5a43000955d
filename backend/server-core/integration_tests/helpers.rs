//! Shared setup: a server on an ephemeral localhost port and clients pointed at it.

use client_core::{Client, ClientOptions, IdentityProvider, InMemoryIdentity, WebSocketFactory};
use server_core::{Server, ServerEvent, ServerOptions};

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use protocol::Command;
use tokio::sync::broadcast::Receiver;
use tokio::time::timeout;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Starts a server on 127.0.0.1 with an OS-assigned port.
pub async fn start_server() -> (Server, Receiver<ServerEvent>, u16) {
    start_server_with(ServerOptions::default()).await
}

/// Like [`start_server`], keeping every option but the address and stale-close delay.
pub async fn start_server_with(options: ServerOptions) -> (Server, Receiver<ServerEvent>, u16) {
    let server = Server::new(ServerOptions {
        port: 0,
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        stale_close_delay: Duration::from_millis(20),
        ..options
    });
    let events = server.subscribe();
    let address = server.start().await.expect("server starts");
    (server, events, address.port())
}

/// A client for `port` whose identity starts as `client_id`.
pub fn client_for(port: u16, client_id: Option<&str>) -> (Client, Arc<InMemoryIdentity>) {
    let identity = Arc::new(InMemoryIdentity::new(client_id.map(str::to_string)));
    let provider: Arc<dyn IdentityProvider> = identity.clone();

    let options = ClientOptions {
        host: Some("127.0.0.1".to_string()),
        port,
        name: "integration".to_string(),
        identity: provider,
        ..ClientOptions::default()
    }
    .with_socket_factory(WebSocketFactory);

    let client = Client::create(options).expect("client configures");
    (client, identity)
}

/// Waits for the first event `select` accepts.
pub async fn wait_for<T>(
    events: &mut Receiver<ServerEvent>,
    mut select: impl FnMut(ServerEvent) -> Option<T>,
) -> T {
    timeout(EVENT_TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event bus open");
            if let Some(found) = select(event) {
                return found;
            }
        }
    })
    .await
    .expect("expected server event did not arrive in time")
}

/// Waits for the next inbound command of `command_type`.
pub async fn wait_for_command(events: &mut Receiver<ServerEvent>, command_type: &str) -> Command {
    wait_for(events, |event| match event {
        ServerEvent::Command(command) if command.command_type.as_str() == command_type => {
            Some(command)
        }
        _ => None,
    })
    .await
}

/// Polls `condition` until it holds or the event timeout passes.
pub async fn eventually(condition: impl Fn() -> bool) {
    timeout(EVENT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time")
}
