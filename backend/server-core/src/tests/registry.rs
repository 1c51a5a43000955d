use crate::registry::{ConnectionRegistry, Effect};

use protocol::{Command, CommandType, Envelope};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

fn envelope(command_type: CommandType, payload: Value) -> Envelope {
    Envelope {
        command_type,
        payload,
        important: false,
        date: None,
        delta_time: 0,
    }
}

fn intro(client_id: Option<&str>) -> Envelope {
    let mut payload = json!({ "name": "app", "platform": "ios" });
    if let Some(client_id) = client_id {
        payload["clientId"] = json!(client_id);
    }
    envelope(CommandType::ClientIntro, payload)
}

fn receive(registry: &mut ConnectionRegistry, id: u64, envelope: Envelope) -> (Command, Vec<Effect>) {
    let receipt = registry.receive(id, envelope, SystemTime::now(), || "abc-123".to_string());
    (receipt.command, receipt.effects)
}

/// **VALUE**: Verifies that connection ids start at 0 and every socket starts partial.
#[test]
fn given_new_registry_when_sockets_accepted_then_ids_count_from_zero() {
    let mut registry = ConnectionRegistry::new();

    let first = registry.accept(Some("10.0.0.1".to_string()));
    let second = registry.accept(None);

    assert_eq!(first.id, 0);
    assert_eq!(second.id, 1);
    assert_eq!(registry.partial_connections().len(), 2);
    assert!(registry.connections().is_empty());
}

/// **VALUE**: Verifies that message ids are receipt sequence numbers shared by every client.
///
/// **WHY THIS MATTERS**: The inspector orders its timeline by `messageId`. A per-client counter
/// would produce duplicates as soon as two applications connect.
///
/// **BUG THIS CATCHES**: Would catch a counter kept per connection, or one starting at 0.
#[test]
fn given_two_sockets_when_messages_interleave_then_message_ids_strictly_increase() {
    // GIVEN: Two sockets
    let mut registry = ConnectionRegistry::new();
    let a = registry.accept(None).id;
    let b = registry.accept(None).id;

    // WHEN: Messages arrive alternately
    let ids: Vec<u64> = [a, b, a, b]
        .into_iter()
        .map(|id| receive(&mut registry, id, envelope(CommandType::Log, json!({}))).0.message_id)
        .collect();

    // THEN: One global sequence starting at 1
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(registry.last_message_id(), 4);
}

/// **VALUE**: Verifies id minting on a handshake without a client id.
///
/// **WHY THIS MATTERS**: The application persists the pushed id and resupplies it on reconnect.
/// Without exactly one `setClientId` per minted id, identity is lost across restarts.
///
/// **BUG THIS CATCHES**: Would catch:
/// - No `setClientId` effect for a missing id
/// - The connection record carrying a different id than the one pushed
/// - The socket staying in the partial list after its handshake
#[test]
fn given_intro_without_client_id_when_received_then_id_is_minted_and_pushed_once() {
    // GIVEN: An accepted socket
    let mut registry = ConnectionRegistry::new();
    let id = registry.accept(Some("127.0.0.1".to_string())).id;

    // WHEN: It introduces itself without a client id
    let (command, effects) = receive(&mut registry, id, intro(None));

    // THEN: Exactly one setClientId, then the connection is established with that id
    let pushes: Vec<&Effect> = effects
        .iter()
        .filter(|effect| matches!(effect, Effect::SetClientId { .. }))
        .collect();
    assert_eq!(
        pushes,
        vec![&Effect::SetClientId {
            connection_id: id,
            client_id: "abc-123".to_string()
        }]
    );

    let connections = registry.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].client_id, "abc-123");
    assert_eq!(connections[0].address.as_deref(), Some("127.0.0.1"));
    assert_eq!(connections[0].name(), Some("app"));
    assert_eq!(connections[0].intro["platform"], "ios");
    assert!(registry.partial_connections().is_empty());

    assert_eq!(command.client_id.as_deref(), Some("abc-123"));
    assert_eq!(command.payload["address"], "127.0.0.1");
}

/// **VALUE**: Verifies dedup when a second socket introduces itself with an id already in use.
///
/// **WHY THIS MATTERS**: After an application reloads, its old socket may linger. Two records for
/// one client would double every unicast and show a ghost connection in the inspector.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The old socket not being scheduled for closure
/// - The old connection record surviving the second handshake
/// - The new socket being closed instead of the old one
#[test]
fn given_same_client_id_on_two_sockets_when_second_intro_arrives_then_only_second_remains() {
    // GIVEN: Socket A introduced as "dup"
    let mut registry = ConnectionRegistry::new();
    let a = registry.accept(None).id;
    let b = registry.accept(None).id;
    receive(&mut registry, a, intro(Some("dup")));

    // WHEN: Socket B introduces itself as "dup"
    let (_, effects) = receive(&mut registry, b, intro(Some("dup")));

    // THEN: A is closed, B is the only record, nothing was minted
    assert!(effects.contains(&Effect::CloseStale(a)));
    assert!(!effects.contains(&Effect::CloseStale(b)));
    assert!(!effects.iter().any(|e| matches!(e, Effect::SetClientId { .. })));

    let connections = registry.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].id, b);
    assert_eq!(registry.connection_for("dup").map(|c| c.id), Some(b));

    // THEN: A closing later does not report a disconnect for a record it no longer owns
    assert!(registry.close(a).is_none());
    assert_eq!(registry.connections().len(), 1);
}

/// **VALUE**: Verifies close handling for partial and full connections.
#[test]
fn given_sockets_in_each_stage_when_closed_then_only_full_connections_are_reported() {
    let mut registry = ConnectionRegistry::new();
    let partial = registry.accept(None).id;
    let full = registry.accept(None).id;
    receive(&mut registry, full, intro(Some("x")));

    assert!(registry.close(partial).is_none());
    assert!(registry.partial_connections().is_empty());

    let closed = registry.close(full).expect("introduced socket reports its connection");
    assert_eq!(closed.client_id, "x");
    assert!(registry.connections().is_empty());
    assert!(registry.connection_for("x").is_none());
    assert_eq!(registry.socket_count(), 0);
}

/// **VALUE**: Verifies addressing: omit the client id to reach everyone, including partial sockets.
#[test]
fn given_tagged_and_untagged_sockets_when_targeting_then_unicast_matches_tag() {
    let mut registry = ConnectionRegistry::new();
    let a = registry.accept(None).id;
    let b = registry.accept(None).id;
    let pending = registry.accept(None).id;
    receive(&mut registry, a, intro(Some("alpha")));
    receive(&mut registry, b, intro(Some("beta")));

    assert_eq!(registry.targets(None), vec![a, b, pending]);
    assert_eq!(registry.targets(Some("beta")), vec![b]);
    assert!(registry.targets(Some("gamma")).is_empty());
}

/// **VALUE**: Verifies that messages after the handshake carry the socket's client id.
#[test]
fn given_introduced_socket_when_logging_then_command_carries_client_id() {
    let mut registry = ConnectionRegistry::new();
    let id = registry.accept(None).id;

    let (before, _) = receive(&mut registry, id, envelope(CommandType::Log, json!({})));
    receive(&mut registry, id, intro(Some("known")));
    let (after, _) = receive(&mut registry, id, envelope(CommandType::Log, json!({})));

    assert!(before.client_id.is_none());
    assert_eq!(after.client_id.as_deref(), Some("known"));
    assert_eq!(after.connection_id, id);
}

/// **VALUE**: Verifies the inbound side effects of state commands.
///
/// **BUG THIS CATCHES**: Would catch subscriptions not being refreshed, or a malformed
/// `state.values.change` leaving stale paths behind.
#[test]
fn given_state_commands_when_received_then_subscriptions_and_backup_name_are_updated() {
    let mut registry = ConnectionRegistry::new();
    let id = registry.accept(None).id;

    receive(
        &mut registry,
        id,
        envelope(
            CommandType::StateValuesChange,
            json!({ "changes": [{ "path": "user.name", "value": "x" }, { "path": "cart" }] }),
        ),
    );
    assert_eq!(registry.subscriptions(), ["user.name", "cart"]);

    receive(&mut registry, id, envelope(CommandType::StateValuesChange, json!({})));
    assert!(registry.subscriptions().is_empty());

    let (backup, _) = receive(
        &mut registry,
        id,
        envelope(
            CommandType::StateBackupResponse,
            json!({ "state": { "a": 1 }, "name": "mine" }),
        ),
    );
    assert_eq!(backup.payload["name"], Value::Null);
    assert_eq!(backup.payload["state"]["a"], 1);
}

/// **VALUE**: Verifies date handling: the sender's date when it parses, receipt time otherwise.
#[test]
fn given_envelope_dates_when_received_then_parsed_or_replaced_by_receipt_time() {
    let mut registry = ConnectionRegistry::new();
    let id = registry.accept(None).id;
    let received_at = UNIX_EPOCH + Duration::from_secs(42);

    let mut dated = envelope(CommandType::Log, json!({}));
    dated.date = Some("2023-11-14T22:13:20.123Z".to_string());
    let mut garbage = envelope(CommandType::Log, json!({}));
    garbage.date = Some("yesterday".to_string());

    let dated = registry.receive(id, dated, received_at, String::new).command;
    let garbage = registry.receive(id, garbage, received_at, String::new).command;

    assert_eq!(
        dated.date,
        UNIX_EPOCH + Duration::from_millis(1_700_000_000_123)
    );
    assert_eq!(garbage.date, received_at);
}
