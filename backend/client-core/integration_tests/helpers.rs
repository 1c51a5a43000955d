//! Test helpers for driving a real client against a bare websocket listener.

use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

/// Binds a listener on an ephemeral localhost port.
pub async fn bind_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let port = listener.local_addr().expect("listener address").port();
    (listener, port)
}

/// Accepts one websocket connection.
pub async fn accept_one(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(Duration::from_secs(2), listener.accept())
        .await
        .expect("No client connected in time")
        .expect("Accept failed");
    accept_async(stream)
        .await
        .expect("WebSocket handshake failed")
}

/// Reads the next text frame as JSON.
pub async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("No frame received in time")
            .expect("Stream ended")
            .expect("Error receiving frame");

        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("Frame was not JSON");
        }
    }
}

/// Polls `condition` for up to two seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 2s");
}
