use crate::client::{CLIENT_CORE_VERSION, Client, DisplayConfig, Phase, delta_millis};
use crate::error::{ClientError, ConfigError, ConnectionError};
use crate::options::InMemoryIdentity;
use crate::plugin::Plugin;
use crate::tests::mock_socket::{MockSocketFactory, eventually, ready_client};

use protocol::{CommandType, Payload, ServerMessage};

use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use serde_json::{Value, json};

// ----------------------------------------------------------------------------
// Queueing and ordering
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that messages sent before the handshake are flushed in order, right after
/// the handshake and ahead of anything sent later.
///
/// **WHY THIS MATTERS**: Applications log during startup, long before the socket opens. The
/// inspector timeline is useless if those early messages arrive shuffled or after later ones.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The queue is drained LIFO
/// - `client.intro` is sent after queued messages
/// - A post-ready send can overtake the queue
#[tokio::test]
async fn given_messages_sent_before_ready_when_handshake_completes_then_flushed_in_order() {
    // GIVEN: A configured client connecting through a scripted socket
    let factory = MockSocketFactory::default();
    let client = Client::create(factory.options()).expect("client configures");
    let handle = client.connect().expect("connect starts");

    // WHEN: Three messages are sent before the socket opens
    for message in ["one", "two", "three"] {
        client.send(CommandType::Log, json!({ "message": message }), false);
    }
    assert_eq!(client.queued(), 3, "Messages should wait in the queue");

    let link = factory.last();
    link.open();
    handle.await.expect("socket opens");
    eventually(|| client.is_ready()).await;

    // WHEN: One more message is sent after ready
    client.send(CommandType::Log, json!({ "message": "four" }), false);

    // THEN: Handshake first, then queued messages in order, then the new one
    let frames = link.frames();
    let types: Vec<&str> = frames.iter().filter_map(|f| f["type"].as_str()).collect();
    assert_eq!(types, ["client.intro", "log", "log", "log", "log"]);

    let messages: Vec<&str> = frames[1..]
        .iter()
        .filter_map(|f| f["payload"]["message"].as_str())
        .collect();
    assert_eq!(messages, ["one", "two", "three", "four"]);
    assert_eq!(client.queued(), 0, "Queue should be drained exactly once");
}

/// **VALUE**: Verifies the delta clock clamps to zero when wall-clock time goes backwards.
///
/// **BUG THIS CATCHES**: Would catch an underflow or a wrapped huge delta after an NTP step.
#[test]
fn given_clock_regression_when_computing_delta_then_clamps_to_zero() {
    // GIVEN: Two timestamps, the second earlier than the first
    let earlier = UNIX_EPOCH + Duration::from_secs(100);
    let later = UNIX_EPOCH + Duration::from_millis(100_250);

    // WHEN / THEN: Forward deltas are measured, backward deltas clamp
    assert_eq!(delta_millis(earlier, later), 250);
    assert_eq!(delta_millis(later, earlier), 0);
}

// ----------------------------------------------------------------------------
// Connect handle
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that connecting without a host fails the handle without opening a socket.
///
/// **WHY THIS MATTERS**: Production builds commonly strip the inspector host. Connecting must
/// then be a harmless no-op rather than a socket to nowhere.
///
/// **BUG THIS CATCHES**: Would catch the factory being called with an empty host.
#[tokio::test]
async fn given_no_host_when_connecting_then_handle_fails_without_socket() {
    // GIVEN: Options with the host removed
    let factory = MockSocketFactory::default();
    let mut options = factory.options();
    options.host = None;
    let client = Client::create(options).expect("client configures");

    // WHEN: Connecting
    let result = client.connect().expect("connect returns a handle").await;

    // THEN: The handle fails and no socket was created
    assert!(matches!(
        result,
        Err(ConnectionError::HostNotConfigured { .. })
    ));
    assert_eq!(factory.count(), 0, "No socket should be opened");
}

/// **VALUE**: Verifies that a socket closing before it opens fails the connect handle.
///
/// **BUG THIS CATCHES**: Would catch a handle that hangs forever when the inspector is down.
#[tokio::test]
async fn given_socket_closes_before_open_when_awaiting_connect_then_handle_fails() {
    // GIVEN: A connecting client
    let factory = MockSocketFactory::default();
    let client = Client::create(factory.options()).expect("client configures");
    let handle = client.connect().expect("connect starts");

    // WHEN: The link drops before opening
    factory.last().drop_link();

    // THEN: The handle reports the failure and the session is Failed
    assert!(matches!(handle.await, Err(ConnectionError::Failed { .. })));
    assert_eq!(client.phase(), Phase::Failed);
}

/// **VALUE**: Verifies that `close()` rejects a pending handle and can be repeated safely.
///
/// **BUG THIS CATCHES**: Would catch a double close panicking or the handle resolving as open.
#[tokio::test]
async fn given_pending_connect_when_closed_twice_then_handle_fails_and_second_close_is_noop() {
    // GIVEN: A connecting client
    let factory = MockSocketFactory::default();
    let client = Client::create(factory.options()).expect("client configures");
    let handle = client.connect().expect("connect starts");
    let link = factory.last();

    // WHEN: Closing twice
    client.close().close();

    // THEN: The handle fails with Closed and the socket was closed once
    assert!(matches!(handle.await, Err(ConnectionError::Closed { .. })));
    assert!(link.is_closed(), "Socket should be closed");
    assert_eq!(client.phase(), Phase::Closed);
}

/// **VALUE**: Verifies `wait_for_connect` before and after a successful handshake.
#[tokio::test]
async fn given_client_when_waiting_for_connect_then_reflects_session_state() {
    // GIVEN: A configured client that never connected
    let factory = MockSocketFactory::default();
    let idle = Client::create(factory.options()).expect("client configures");

    // WHEN / THEN: Waiting fails with NotConnected
    assert!(matches!(
        idle.wait_for_connect().await,
        Err(ConnectionError::NotConnected { .. })
    ));

    // GIVEN: A ready client
    let (client, _link) = ready_client(&factory, factory.options()).await;

    // WHEN / THEN: Waiting resolves immediately
    client.wait_for_connect().await.expect("ready client is connected");
}

/// **VALUE**: Verifies that connecting an unconfigured client is a configuration error.
#[tokio::test]
async fn given_unconfigured_client_when_connecting_then_returns_not_configured() {
    let client = Client::new();

    let result = client.connect();

    assert!(matches!(
        result,
        Err(ClientError::Config(ConfigError::NotConfigured { .. }))
    ));
    assert_eq!(client.phase(), Phase::Unconfigured);
}

// ----------------------------------------------------------------------------
// Transport failures and reconnection
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies that a failed write demotes the session, drops the message, and queues
/// later sends.
///
/// **WHY THIS MATTERS**: Writing into a half-closed socket must not crash the application. The
/// session has to stop writing until a new connection is established.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The client stays Ready after a write failure
/// - The failed message is silently re-queued (it is dropped)
#[tokio::test]
async fn given_ready_client_when_write_fails_then_demoted_and_later_sends_queue() {
    // GIVEN: A ready client whose socket starts failing writes
    let factory = MockSocketFactory::default();
    let (client, link) = ready_client(&factory, factory.options()).await;
    link.break_writes();

    // WHEN: Sending twice
    client.send(CommandType::Log, json!({ "message": "lost" }), false);
    client.send(CommandType::Log, json!({ "message": "kept" }), false);

    // THEN: The first is dropped, the client is not ready, the second waits
    assert_eq!(client.phase(), Phase::Failed);
    assert!(!client.is_ready());
    assert_eq!(client.queued(), 1, "Only the post-failure message is queued");
    assert_eq!(link.types(), ["client.intro"]);
}

/// **VALUE**: Verifies manual reconnection: close, connect, and flush on the new socket.
///
/// **BUG THIS CATCHES**: Would catch a late close event from the old socket demoting the new
/// session, or queued messages leaking onto the old socket.
#[tokio::test]
async fn given_closed_client_when_reconnected_then_new_socket_receives_handshake_and_queue() {
    // GIVEN: A ready client that is then closed
    let factory = MockSocketFactory::default();
    let (client, first) = ready_client(&factory, factory.options()).await;
    client.close();

    // WHEN: Sending while closed, then reconnecting
    client.send(CommandType::Clear, Payload::Undefined, false);
    let handle = client.connect().expect("reconnect starts");
    let second = factory.last();
    second.open();
    handle.await.expect("second socket opens");
    eventually(|| client.is_ready()).await;

    // THEN: The second socket gets its own handshake followed by the queued message
    assert_eq!(second.types(), ["client.intro", "clear"]);
    assert_eq!(first.types(), ["client.intro"]);
    assert_eq!(factory.count(), 2);
}

// ----------------------------------------------------------------------------
// Handshake and inbound messages
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the handshake payload: metadata, resolved client id and core version.
///
/// **WHY THIS MATTERS**: The server dedupes sessions by `clientId` and the inspector labels them
/// by `name`. A missing field breaks identity across reconnects.
///
/// **BUG THIS CATCHES**: Would catch the identity provider being ignored or metadata maps not
/// being merged into the handshake.
#[tokio::test]
async fn given_stored_client_id_when_handshake_sent_then_intro_carries_identity_and_metadata() {
    // GIVEN: Options with metadata and a stored client id
    let factory = MockSocketFactory::default();
    let mut options = factory.options();
    options.name = "demo-app".to_string();
    options.environment = Some("development".to_string());
    options.client.insert("platform".to_string(), json!("linux"));
    options.info.insert("build".to_string(), json!(42));
    options.identity = Arc::new(InMemoryIdentity::new(Some("stored-id".to_string())));

    // WHEN: The session becomes ready
    let (_client, link) = ready_client(&factory, options).await;

    // THEN: The intro carries everything
    let intro = &link.frames()[0];
    assert_eq!(intro["type"], "client.intro");
    assert_eq!(
        intro["payload"],
        json!({
            "environment": "development",
            "platform": "linux",
            "build": 42,
            "name": "demo-app",
            "clientId": "stored-id",
            "clientCoreVersion": CLIENT_CORE_VERSION,
        })
    );
    assert_eq!(factory.urls(), ["ws://localhost:9600/"]);
}

/// **VALUE**: Verifies that an inbound `setClientId` is handed to the identity provider.
///
/// **BUG THIS CATCHES**: Would catch a minted id never being persisted, which would make every
/// reconnect look like a new application.
#[tokio::test]
async fn given_set_client_id_message_when_received_then_identity_is_persisted() {
    // GIVEN: A ready client with an empty in-memory identity
    let factory = MockSocketFactory::default();
    let identity = Arc::new(InMemoryIdentity::default());
    let mut options = factory.options();
    options.identity = identity.clone();
    let (_client, link) = ready_client(&factory, options).await;

    // WHEN: The server pushes a minted id
    link.deliver_json(json!({ "type": "setClientId", "payload": "abc-123" }));

    // THEN: The provider stores it
    eventually(|| identity.client_id().as_deref() == Some("abc-123")).await;
}

/// **VALUE**: Verifies that a malformed inbound frame is skipped and the session keeps working.
///
/// **BUG THIS CATCHES**: Would catch a decode error tearing down the drive task.
#[tokio::test]
async fn given_malformed_frame_when_received_then_skipped_and_later_frames_processed() {
    // GIVEN: A ready client subscribed to inbound messages
    let factory = MockSocketFactory::default();
    let (client, link) = ready_client(&factory, factory.options()).await;
    let mut inbound = client.subscribe();

    // WHEN: Garbage arrives, followed by a valid message
    link.deliver("{not json");
    link.deliver_json(json!({ "type": "state.backup.request", "payload": {} }));

    // THEN: Only the valid message is observed and the session is still ready
    let message = tokio::time::timeout(Duration::from_secs(1), inbound.recv())
        .await
        .expect("message arrives in time")
        .expect("channel open");
    assert_eq!(message.command_type, CommandType::StateBackupRequest);
    assert!(client.is_ready());
}

#[derive(Clone)]
struct Recorder {
    label: &'static str,
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn record(&self, event: &str) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("{}:{}", self.label, event));
    }
}

impl Plugin for Recorder {
    fn on_command(&self, command: &ServerMessage) {
        self.record(command.command_type.as_str());
    }

    fn on_connect(&self) {
        self.record("connect");
    }

    fn on_disconnect(&self) {
        self.record("disconnect");
    }
}

/// **VALUE**: Verifies that the options-level hooks run before plugin hooks for every event.
///
/// **BUG THIS CATCHES**: Would catch a hook being skipped for one event kind or running out of
/// order.
#[tokio::test]
async fn given_option_hooks_and_plugin_when_events_occur_then_options_hook_runs_first() {
    // GIVEN: Options hooks and a recording plugin sharing one log
    let events = Arc::new(Mutex::new(Vec::new()));
    let factory = MockSocketFactory::default();
    let mut options = factory.options();
    let log = events.clone();
    options.on_connect = Some(Arc::new(move || {
        log.lock().expect("events lock").push("options:connect".to_string())
    }));
    let log = events.clone();
    options.on_command = Some(Arc::new(move |command: &ServerMessage| {
        log.lock()
            .expect("events lock")
            .push(format!("options:{}", command.command_type))
    }));
    let log = events.clone();
    options.on_disconnect = Some(Arc::new(move || {
        log.lock()
            .expect("events lock")
            .push("options:disconnect".to_string())
    }));
    let recorder = Recorder {
        label: "plugin",
        events: events.clone(),
    };
    options.plugins = vec![crate::plugin::PluginCreator::new(move |_| recorder.clone())];

    // WHEN: Connecting, receiving one message and losing the socket
    let (client, link) = ready_client(&factory, options).await;
    link.deliver_json(json!({ "type": "clear" }));
    link.drop_link();
    eventually(|| client.phase() == Phase::Failed).await;

    // THEN: Options hooks precede plugin hooks for each event
    assert_eq!(
        *events.lock().expect("events lock"),
        [
            "options:connect",
            "plugin:connect",
            "options:clear",
            "plugin:clear",
            "options:disconnect",
            "plugin:disconnect",
        ]
    );
}

/// **VALUE**: Verifies the `display` envelope layout, with a missing value sent as null.
#[tokio::test]
async fn given_display_config_when_displayed_then_sends_display_envelope() {
    // GIVEN: A ready client
    let factory = MockSocketFactory::default();
    let (client, link) = ready_client(&factory, factory.options()).await;

    // WHEN: Displaying without a value
    client.display(DisplayConfig {
        name: "ORDER".to_string(),
        preview: Some("3 items".to_string()),
        important: true,
        ..DisplayConfig::default()
    });

    // THEN: The envelope matches the inspector's layout
    let frame = link.frames_of("display").remove(0);
    assert_eq!(frame["important"], true);
    assert_eq!(
        frame["payload"],
        json!({ "name": "ORDER", "value": null, "preview": "3 items", "image": null })
    );
    assert!(frame["deltaTime"].is_u64());
    assert!(frame["date"].as_str().is_some_and(|d| d.ends_with('Z')));
    assert_eq!(frame["payload"]["value"], Value::Null);
}
