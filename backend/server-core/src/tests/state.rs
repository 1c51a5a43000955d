use crate::event::ServerEvent;
use crate::state::{Outbound, RegistryCommand, RegistryState};

use protocol::CommandType;

use std::time::{Duration, SystemTime};

use serde_json::{Value, json};
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;

async fn open_socket(state: &RegistryState) -> (u64, UnboundedReceiver<Outbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let partial = state.accept(None, tx).await.expect("actor accepts");
    (partial.id, rx)
}

async fn receive(state: &RegistryState, connection_id: u64, frame: Value) {
    state
        .update(RegistryCommand::Receive {
            connection_id,
            frame: frame.to_string().into_bytes(),
            received_at: SystemTime::now(),
        })
        .await
        .expect("actor receives");
}

async fn next_command(events: &mut Receiver<ServerEvent>) -> protocol::Command {
    loop {
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event in time")
            .expect("event bus open");
        if let ServerEvent::Command(command) = event {
            return command;
        }
    }
}

async fn next_outbound(rx: &mut UnboundedReceiver<Outbound>) -> Outbound {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("outbound in time")
        .expect("outbound channel open")
}

/// **VALUE**: Verifies that a minted id is written to the introducing socket before its
/// handshake command is reported.
#[tokio::test]
async fn given_intro_without_id_when_actor_handles_it_then_set_client_id_is_written() {
    // GIVEN: An actor with one socket
    let state = RegistryState::new(Duration::from_millis(10));
    let mut events = state.subscribe();
    let (id, mut outbound) = open_socket(&state).await;

    // WHEN: The socket introduces itself without an id
    receive(&state, id, json!({ "type": "client.intro", "payload": { "name": "app" } })).await;

    // THEN: The socket gets setClientId with the id the command reports
    let command = next_command(&mut events).await;
    let Outbound::Frame(frame) = next_outbound(&mut outbound).await else {
        panic!("expected a text frame");
    };
    let pushed: Value = serde_json::from_str(&frame).expect("frame is JSON");
    assert_eq!(pushed["type"], "setClientId");
    assert_eq!(pushed["payload"].as_str(), command.client_id.as_deref());
    assert_eq!(command.message_id, 1);

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.connections.len(), 1);
    assert!(snapshot.partial_connections.is_empty());
}

/// **VALUE**: Verifies that the superseded socket is closed after the grace period.
///
/// **BUG THIS CATCHES**: Would catch the close being sent to the new socket, or never sent.
#[tokio::test]
async fn given_duplicate_client_when_second_intro_arrives_then_first_socket_is_closed() {
    // GIVEN: Two sockets, the first introduced as "dup"
    let state = RegistryState::new(Duration::from_millis(10));
    let (a, mut a_out) = open_socket(&state).await;
    let (b, mut b_out) = open_socket(&state).await;
    let intro = json!({ "type": "client.intro", "payload": { "clientId": "dup" } });
    receive(&state, a, intro.clone()).await;

    // WHEN: The second socket introduces itself with the same id
    receive(&state, b, intro).await;

    // THEN: Only the first socket is told to close
    assert_eq!(next_outbound(&mut a_out).await, Outbound::Close);
    assert!(
        timeout(Duration::from_millis(50), b_out.recv()).await.is_err(),
        "the new socket must stay open"
    );
    let connections = state.snapshot().await.connections;
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].id, b);
}

/// **VALUE**: Verifies multicast, unicast and malformed-frame tolerance through the actor.
#[tokio::test]
async fn given_two_clients_when_sending_then_addressing_and_bad_frames_behave() {
    // GIVEN: Two introduced sockets
    let state = RegistryState::new(Duration::from_millis(10));
    let mut events = state.subscribe();
    let (a, mut a_out) = open_socket(&state).await;
    let (b, mut b_out) = open_socket(&state).await;
    receive(&state, a, json!({ "type": "client.intro", "payload": { "clientId": "a" } })).await;
    receive(&state, b, json!({ "type": "client.intro", "payload": { "clientId": "b" } })).await;

    // WHEN: A malformed frame arrives, then a valid one
    state
        .update(RegistryCommand::Receive {
            connection_id: a,
            frame: b"not json".to_vec(),
            received_at: SystemTime::now(),
        })
        .await
        .expect("actor survives");
    receive(&state, a, json!({ "type": "log", "payload": { "message": "hi" } })).await;

    // THEN: The bad frame consumed no message id
    let mut last = next_command(&mut events).await;
    while last.command_type != CommandType::Log {
        last = next_command(&mut events).await;
    }
    assert_eq!(last.message_id, 3);

    // WHEN: Sending to "b", then to everyone
    state
        .update(RegistryCommand::Send {
            message: protocol::ServerMessage::new(CommandType::Clear, Value::Null),
            client_id: Some("b".to_string()),
        })
        .await
        .expect("unicast");
    state
        .update(RegistryCommand::Send {
            message: protocol::ServerMessage::new(CommandType::DevtoolsOpen, Value::Null),
            client_id: None,
        })
        .await
        .expect("multicast");

    // THEN: b gets both, a only the multicast
    let frame_type = |outbound: Outbound| match outbound {
        Outbound::Frame(frame) => serde_json::from_str::<Value>(&frame).expect("JSON")["type"]
            .as_str()
            .map(str::to_string),
        _ => None,
    };
    assert_eq!(frame_type(next_outbound(&mut b_out).await).as_deref(), Some("clear"));
    assert_eq!(
        frame_type(next_outbound(&mut b_out).await).as_deref(),
        Some("devtools.open")
    );
    assert_eq!(
        frame_type(next_outbound(&mut a_out).await).as_deref(),
        Some("devtools.open")
    );
}

/// **VALUE**: Verifies lifecycle events for a socket that completes its handshake and then closes.
#[tokio::test]
async fn given_socket_lifecycle_when_closed_then_connect_established_disconnect_are_emitted() {
    let state = RegistryState::new(Duration::from_millis(10));
    let mut events = state.subscribe();
    let (id, _outbound) = open_socket(&state).await;
    receive(&state, id, json!({ "type": "client.intro", "payload": { "clientId": "c" } })).await;
    state
        .update(RegistryCommand::Closed { connection_id: id })
        .await
        .expect("actor records close");

    let mut seen = Vec::new();
    while seen.len() < 4 {
        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event in time")
            .expect("event bus open");
        seen.push(event);
    }

    assert!(matches!(seen[0], ServerEvent::Connect(ref partial) if partial.id == id));
    assert!(matches!(seen[1], ServerEvent::ConnectionEstablished(ref c) if c.client_id == "c"));
    assert!(matches!(seen[2], ServerEvent::Command(ref c) if c.command_type == CommandType::ClientIntro));
    assert!(matches!(seen[3], ServerEvent::Disconnect(ref c) if c.id == id));
    assert!(state.snapshot().await.connections.is_empty());
}
