//! Bare tungstenite clients against a real server, for frames the client crate never sends.

use crate::helpers::{EVENT_TIMEOUT, start_server, start_server_with, wait_for};

use server_core::{ServerEvent, ServerOptions};

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

fn intro_frame(client_id: &str) -> String {
    json!({
        "type": "client.intro",
        "payload": { "name": "raw", "clientId": client_id },
        "important": false,
        "date": "2024-01-01T00:00:00.000Z",
        "deltaTime": 0
    })
    .to_string()
}

/// **VALUE**: Verifies that a binary-framed handshake is decoded the same as a text one.
///
/// **WHY THIS MATTERS**: Some runtimes send UTF-8 JSON in binary frames. Those clients must
/// still show up in the inspector.
///
/// **BUG THIS CATCHES**: Would catch the read loop skipping `Message::Binary` frames.
#[tokio::test]
async fn given_binary_intro_when_received_then_connection_is_established() {
    // GIVEN: A running server and a raw socket
    let (server, mut events, port) = start_server().await;
    let (mut socket, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .expect("socket connects");

    // WHEN: The handshake arrives as a binary frame
    socket
        .send(Message::Binary(intro_frame("raw-bin").into_bytes().into()))
        .await
        .expect("send binary intro");

    // THEN: The connection is established under the supplied id
    let connection = wait_for(&mut events, |event| match event {
        ServerEvent::ConnectionEstablished(connection) => Some(connection),
        _ => None,
    })
    .await;
    assert_eq!(connection.client_id, "raw-bin");
    assert_eq!(connection.name(), Some("raw"));
    assert_eq!(server.connections().await.len(), 1);
}

/// **VALUE**: Verifies that keep-alive pings reach open sockets and never remove connections.
///
/// **WHY THIS MATTERS**: Idle applications sit connected for hours. Pings keep intermediaries
/// from dropping the socket, and a ping must not be mistaken for a liveness check that prunes.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The keep-alive task never being spawned or never ticking
/// - Pings only going to established connections
/// - Connections being dropped on a keep-alive tick
#[tokio::test]
async fn given_short_keep_alive_when_socket_idles_then_pings_arrive_and_connection_stays() {
    // GIVEN: A server pinging every few milliseconds and an established raw client
    let (server, mut events, port) = start_server_with(ServerOptions {
        keep_alive: Duration::from_millis(10),
        ..ServerOptions::default()
    })
    .await;
    let (mut socket, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .expect("socket connects");
    socket
        .send(Message::Text(intro_frame("idle").into()))
        .await
        .expect("send intro");
    wait_for(&mut events, |event| match event {
        ServerEvent::ConnectionEstablished(connection) => Some(connection),
        _ => None,
    })
    .await;

    // WHEN: The client idles long enough for several ticks
    let mut pings = 0;
    timeout(EVENT_TIMEOUT, async {
        while pings < 3 {
            match socket.next().await {
                Some(Ok(Message::Ping(_))) => pings += 1,
                Some(Ok(_)) => {}
                other => panic!("socket ended while waiting for pings: {other:?}"),
            }
        }
    })
    .await
    .expect("pings did not arrive in time");

    // THEN: The connection is still registered
    let connections = server.connections().await;
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].client_id, "idle");
}
