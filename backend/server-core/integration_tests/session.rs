use crate::helpers::{client_for, eventually, start_server, wait_for, wait_for_command};

use client_core::plugins::Logger;
use client_core::{CustomCommand, Phase};
use server_core::{Server, ServerError, ServerEvent, ServerOptions};

use std::net::{IpAddr, Ipv4Addr};

use serde_json::json;
use tokio::net::TcpListener;

/// **VALUE**: Verifies the whole first-contact flow between a real client and a real server.
///
/// **WHY THIS MATTERS**: This is the path every application takes on first launch: no stored id,
/// the server mints one, the client persists it, and its logs arrive attributed to that id.
///
/// **BUG THIS CATCHES**: Would catch:
/// - `setClientId` never reaching the identity provider
/// - Logs arriving without the assigned client id
/// - Message ids not following receipt order
#[tokio::test]
async fn given_fresh_client_when_it_connects_and_logs_then_server_attributes_log_to_minted_id() {
    // GIVEN: A running server and a client with no stored id
    let (_server, mut events, port) = start_server().await;
    let (client, identity) = client_for(port, None);

    // WHEN: The client connects and logs
    client.connect().expect("connect starts").await.expect("socket opens");
    let intro = wait_for_command(&mut events, "client.intro").await;
    client.require::<Logger>().expect("logger installed").log("hello");
    let log = wait_for_command(&mut events, "log").await;

    // THEN: The minted id is persisted by the client and stamped on the log
    let minted = intro.client_id.clone().expect("intro carries the minted id");
    eventually(|| identity.client_id().as_deref() == Some(minted.as_str())).await;

    assert_eq!(intro.message_id, 1);
    assert_eq!(log.message_id, 2);
    assert_eq!(log.client_id.as_deref(), Some(minted.as_str()));
    assert_eq!(log.connection_id, intro.connection_id);
    assert_eq!(log.payload["message"], "hello");
    assert_eq!(log.payload["level"], "debug");
}

/// **VALUE**: Verifies dedup over real sockets.
///
/// **WHY THIS MATTERS**: A reloaded application reconnects with its persisted id while the old
/// socket may still be open; the inspector must show one client, not two.
///
/// **BUG THIS CATCHES**: Would catch the registry keeping both records or closing the wrong socket.
#[tokio::test]
async fn given_two_clients_with_same_id_when_second_connects_then_first_is_closed() {
    // GIVEN: Client A connected as "dup"
    let (server, mut events, port) = start_server().await;
    let (first, _) = client_for(port, Some("dup"));
    first.connect().expect("connect starts").await.expect("A opens");
    let first_connection = wait_for(&mut events, |event| match event {
        ServerEvent::ConnectionEstablished(connection) => Some(connection),
        _ => None,
    })
    .await;

    // WHEN: Client B connects as "dup"
    let (second, _) = client_for(port, Some("dup"));
    second.connect().expect("connect starts").await.expect("B opens");
    let second_connection = wait_for(&mut events, |event| match event {
        ServerEvent::ConnectionEstablished(connection) => Some(connection),
        _ => None,
    })
    .await;

    // THEN: A's socket is closed and only B is listed
    eventually(|| first.phase() == Phase::Failed).await;
    let connections = server.connections().await;
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].id, second_connection.id);
    assert_ne!(first_connection.id, second_connection.id);
    assert_eq!(connections[0].client_id, "dup");
    assert!(second.is_ready());
}

/// **VALUE**: Verifies a custom command round trip: inspector invokes, application answers.
#[tokio::test]
async fn given_registered_custom_command_when_server_invokes_it_then_response_arrives() {
    // GIVEN: A client exposing "ping"
    let (server, mut events, port) = start_server().await;
    let (client, _) = client_for(port, Some("rpc"));
    client
        .register_custom_command(
            CustomCommand::new("ping")
                .title("Ping")
                .handler(|args| async move { Some(json!({ "pong": args.get("n").cloned() })) }),
        )
        .expect("command registers");
    client.connect().expect("connect starts").await.expect("socket opens");
    let register = wait_for_command(&mut events, "customCommand.register").await;
    assert_eq!(register.payload["command"], "ping");

    // WHEN: The server sends a structured invocation to that client only
    server
        .send(
            "custom",
            json!({ "command": "ping", "args": { "n": 7 } }),
            Some("rpc"),
        )
        .await
        .expect("send");

    // THEN: The response pairs the command name with the handler result
    let response = wait_for_command(&mut events, "customCommand.response").await;
    assert_eq!(response.payload["command"], "ping");
    assert_eq!(response.payload["payload"]["pong"], 7);
}

/// **VALUE**: Verifies that a taken port is reported as such rather than as a generic failure.
#[tokio::test]
async fn given_port_in_use_when_starting_then_port_unavailable_is_reported() {
    // GIVEN: A port held by another listener
    let holder = TcpListener::bind("127.0.0.1:0").await.expect("bind holder");
    let port = holder.local_addr().expect("holder address").port();
    let server = Server::new(ServerOptions {
        port,
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..ServerOptions::default()
    });
    let mut events = server.subscribe();

    // WHEN: Starting on it
    let result = server.start().await;

    // THEN: Both the error and the event name the port
    assert!(matches!(result, Err(ServerError::PortUnavailable { port: p, .. }) if p == port));
    let reported = wait_for(&mut events, |event| match event {
        ServerEvent::PortUnavailable(p) => Some(p),
        _ => None,
    })
    .await;
    assert_eq!(reported, port);
    assert!(!server.is_started().await);
}

/// **VALUE**: Verifies that stopping the server closes client sockets and reports both sides.
#[tokio::test]
async fn given_connected_client_when_server_stops_then_client_is_disconnected() {
    // GIVEN: A ready client
    let (server, mut events, port) = start_server().await;
    let (client, _) = client_for(port, Some("stopper"));
    client.connect().expect("connect starts").await.expect("socket opens");
    wait_for_command(&mut events, "client.intro").await;
    eventually(|| client.is_ready()).await;

    // WHEN: The server stops
    server.stop().await.expect("server stops");

    // THEN: The client drops out of ready and the server reports the disconnect
    eventually(|| client.phase() == Phase::Failed).await;
    let gone = wait_for(&mut events, |event| match event {
        ServerEvent::Disconnect(connection) => Some(connection),
        _ => None,
    })
    .await;
    assert_eq!(gone.client_id, "stopper");
    assert!(!server.is_started().await);
    assert!(server.connections().await.is_empty());
}

/// **VALUE**: Verifies that subscriptions follow the latest `state.values.change`.
#[tokio::test]
async fn given_state_change_from_client_when_received_then_server_subscriptions_update() {
    let (server, mut events, port) = start_server().await;
    let (client, _) = client_for(port, None);
    client.connect().expect("connect starts").await.expect("socket opens");

    client.send(
        "state.values.change",
        json!({ "changes": [{ "path": "todos", "value": [] }] }),
        false,
    );
    wait_for_command(&mut events, "state.values.change").await;

    assert_eq!(server.subscriptions().await, vec!["todos".to_string()]);
}
