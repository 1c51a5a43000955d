use crate::helpers::{accept_one, bind_listener, eventually, next_json};

use client_core::plugins::Logger;
use client_core::{
    Client, ClientOptions, IdentityProvider, InMemoryIdentity, Phase, WebSocketFactory,
};

use std::sync::Arc;

use futures_util::SinkExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

fn options_for(port: u16) -> ClientOptions {
    ClientOptions {
        host: Some("127.0.0.1".to_string()),
        port,
        name: "integration".to_string(),
        ..ClientOptions::default()
    }
    .with_socket_factory(WebSocketFactory)
}

/// **VALUE**: Verifies the real websocket factory end to end: handshake first, then queued
/// messages, over an actual TCP socket.
///
/// **WHY THIS MATTERS**: The state machine is tested against an in-memory socket. This test
/// proves the tokio-tungstenite link delivers the same frames in the same order.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The link task never reports Open
/// - Frames are written as binary instead of text
/// - The queue is flushed before the handshake on a real socket
#[tokio::test]
async fn given_real_listener_when_client_connects_then_intro_precedes_queued_log() {
    // GIVEN: A bare websocket listener
    let (listener, port) = bind_listener().await;
    let client = Client::create(options_for(port)).expect("client configures");

    // WHEN: Logging before connecting, then connecting
    client
        .require::<Logger>()
        .expect("logger installed")
        .log("early");
    let handle = client.connect().expect("connect starts");
    let mut server = accept_one(&listener).await;
    handle.await.expect("socket opens");

    // THEN: The server reads the handshake, then the queued log
    let intro = next_json(&mut server).await;
    assert_eq!(intro["type"], "client.intro");
    assert_eq!(intro["payload"]["name"], "integration");
    assert!(intro["payload"]["clientId"].is_null());

    let log = next_json(&mut server).await;
    assert_eq!(log["type"], "log");
    assert_eq!(log["payload"]["message"], "early");
    assert!(client.is_ready());
}

/// **VALUE**: Verifies that a minted id pushed by the server is persisted through the identity
/// provider on a real socket.
#[tokio::test]
async fn given_server_pushes_client_id_when_received_then_identity_is_updated() {
    // GIVEN: A connected client with an in-memory identity
    let (listener, port) = bind_listener().await;
    let identity = Arc::new(InMemoryIdentity::default());
    let mut options = options_for(port);
    let provider: Arc<dyn IdentityProvider> = identity.clone();
    options.identity = provider;
    let client = Client::create(options).expect("client configures");
    let handle = client.connect().expect("connect starts");
    let mut server = accept_one(&listener).await;
    handle.await.expect("socket opens");
    next_json(&mut server).await;

    // WHEN: The server sends setClientId
    server
        .send(Message::Text(
            json!({ "type": "setClientId", "payload": "abc-123" })
                .to_string()
                .into(),
        ))
        .await
        .expect("send setClientId");

    // THEN: The identity provider stores it
    eventually(|| identity.client_id().as_deref() == Some("abc-123")).await;
}

/// **VALUE**: Verifies that a binary frame from the server is decoded like a text frame.
///
/// **BUG THIS CATCHES**: Would catch the link dropping `Message::Binary` instead of forwarding
/// its bytes to the session.
#[tokio::test]
async fn given_server_sends_binary_frame_when_received_then_command_is_handled() {
    // GIVEN: A connected client with an in-memory identity
    let (listener, port) = bind_listener().await;
    let identity = Arc::new(InMemoryIdentity::default());
    let mut options = options_for(port);
    let provider: Arc<dyn IdentityProvider> = identity.clone();
    options.identity = provider;
    let client = Client::create(options).expect("client configures");
    let handle = client.connect().expect("connect starts");
    let mut server = accept_one(&listener).await;
    handle.await.expect("socket opens");
    next_json(&mut server).await;

    // WHEN: The server sends setClientId as a binary frame
    let frame = json!({ "type": "setClientId", "payload": "bin-42" }).to_string();
    server
        .send(Message::Binary(frame.into_bytes().into()))
        .await
        .expect("send binary setClientId");

    // THEN: The identity provider stores it
    eventually(|| identity.client_id().as_deref() == Some("bin-42")).await;
}

/// **VALUE**: Verifies that the server going away demotes the client.
///
/// **BUG THIS CATCHES**: Would catch a link task that never reports Close, leaving the client
/// writing into a dead socket.
#[tokio::test]
async fn given_connected_client_when_server_closes_then_client_leaves_ready() {
    // GIVEN: A ready client
    let (listener, port) = bind_listener().await;
    let client = Client::create(options_for(port)).expect("client configures");
    let handle = client.connect().expect("connect starts");
    let mut server = accept_one(&listener).await;
    handle.await.expect("socket opens");
    next_json(&mut server).await;
    eventually(|| client.is_ready()).await;

    // WHEN: The server closes the socket
    server.close(None).await.expect("server closes");
    drop(server);

    // THEN: The client is no longer ready
    eventually(|| client.phase() == Phase::Failed).await;
}

/// **VALUE**: Verifies that nothing listening fails the connect handle instead of hanging.
#[tokio::test]
async fn given_nothing_listening_when_connecting_then_handle_fails() {
    // GIVEN: A port that was bound and released
    let (listener, port) = bind_listener().await;
    drop(listener);
    let client = Client::create(options_for(port)).expect("client configures");

    // WHEN / THEN: The handle fails
    let result = client.connect().expect("connect starts").await;
    assert!(result.is_err());
    assert_eq!(client.phase(), Phase::Failed);
}
