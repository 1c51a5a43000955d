use crate::client::Client;
use crate::custom_command::{CustomCommand, is_reportable};
use crate::error::{ClientError, CustomCommandError};
use crate::tests::mock_socket::{MockSocketFactory, eventually, ready_client};

use protocol::custom_command::CustomCommandArg;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

fn counting(name: &str, counter: Arc<AtomicUsize>, reply: Value) -> CustomCommand {
    CustomCommand::new(name).handler(move |_args| {
        let counter = counter.clone();
        let reply = reply.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(reply)
        }
    })
}

/// **VALUE**: Verifies that registering a name twice replaces the first registration.
///
/// **WHY THIS MATTERS**: Hot reload re-runs registration code. The inspector must end up with a
/// single button per command, wired to the newest handler.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The stale entry is not unregistered with the inspector
/// - Ids are reused
/// - The stale handler still runs on invocation
#[tokio::test]
async fn given_command_registered_twice_when_invoked_then_only_latest_handler_runs() {
    // GIVEN: A ready client with "foo" registered twice
    let factory = MockSocketFactory::default();
    let (client, link) = ready_client(&factory, factory.options()).await;
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    client
        .register_custom_command(counting("foo", first.clone(), json!("first")))
        .expect("first registration");
    client
        .register_custom_command(counting("foo", second.clone(), json!("second")))
        .expect("second registration");

    // THEN: register(1), unregister(1), register(2) reached the inspector
    let traffic: Vec<(String, Value)> = link
        .frames()
        .into_iter()
        .filter(|f| f["type"].as_str().is_some_and(|t| t.starts_with("customCommand.")))
        .map(|f| (f["type"].as_str().unwrap_or_default().to_string(), f["payload"]["id"].clone()))
        .collect();
    assert_eq!(
        traffic,
        [
            ("customCommand.register".to_string(), json!(1)),
            ("customCommand.unregister".to_string(), json!(1)),
            ("customCommand.register".to_string(), json!(2)),
        ]
    );
    assert_eq!(client.custom_command_count(), 1);

    // WHEN: The inspector invokes "foo"
    link.deliver_json(json!({ "type": "custom", "payload": "foo" }));

    // THEN: Only the second handler runs and its result is sent back
    eventually(|| !link.frames_of("customCommand.response").is_empty()).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(
        link.frames_of("customCommand.response")[0]["payload"],
        json!({ "command": "foo", "payload": "second" })
    );
}

/// **VALUE**: Verifies that structured invocations pass their args to the handler.
#[tokio::test]
async fn given_structured_invocation_when_dispatched_then_handler_receives_args() {
    // GIVEN: A command echoing its `name` arg
    let factory = MockSocketFactory::default();
    let (client, link) = ready_client(&factory, factory.options()).await;
    client
        .register_custom_command(
            CustomCommand::new("greet")
                .arg(CustomCommandArg::string("name"))
                .handler(|args| async move {
                    args.get("name")
                        .and_then(Value::as_str)
                        .map(|name| json!(format!("hello {name}")))
                }),
        )
        .expect("registration");

    // WHEN: Invoked with args
    link.deliver_json(json!({
        "type": "custom",
        "payload": { "command": "greet", "args": { "name": "ada" } }
    }));

    // THEN: The reply pairs the command with the result
    eventually(|| !link.frames_of("customCommand.response").is_empty()).await;
    assert_eq!(
        link.frames_of("customCommand.response")[0]["payload"],
        json!({ "command": "greet", "payload": "hello ada" })
    );
}

/// **VALUE**: Verifies that an empty handler result sends no response.
///
/// **BUG THIS CATCHES**: Would catch a `customCommand.response` with a null payload cluttering the
/// inspector for fire-and-forget commands.
#[tokio::test]
async fn given_handler_returning_nothing_when_invoked_then_no_response_sent() {
    // GIVEN: A fire-and-forget command
    let factory = MockSocketFactory::default();
    let (client, link) = ready_client(&factory, factory.options()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    client
        .register_custom_command(CustomCommand::new("reset").handler(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            }
        }))
        .expect("registration");

    // WHEN: Invoked
    link.deliver_json(json!({ "type": "custom", "payload": { "command": "reset" } }));
    eventually(|| calls.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // THEN: No response is sent
    assert!(link.frames_of("customCommand.response").is_empty());
}

/// **VALUE**: Verifies each registration contract violation.
///
/// **BUG THIS CATCHES**: Would catch a command without a handler being announced to the
/// inspector, or duplicate arg names slipping through.
#[test]
fn given_invalid_commands_when_registered_then_rejected() {
    // GIVEN: An unconnected client
    let client = Client::new();

    // WHEN / THEN: Missing name
    let result = client.register_custom_command(counting("", Arc::default(), json!(1)));
    assert!(matches!(
        result,
        Err(ClientError::CustomCommand(CustomCommandError::MissingCommand { .. }))
    ));

    // WHEN / THEN: Missing handler
    let result = client.register_custom_command(CustomCommand::new("noop"));
    assert!(matches!(
        result,
        Err(ClientError::CustomCommand(CustomCommandError::MissingHandler { .. }))
    ));

    // WHEN / THEN: Nameless arg
    let result = client.register_custom_command(
        counting("args", Arc::default(), json!(1)).arg(CustomCommandArg::string("")),
    );
    assert!(matches!(
        result,
        Err(ClientError::CustomCommand(CustomCommandError::ArgMissingName { .. }))
    ));

    // WHEN / THEN: Duplicate arg
    let result = client.register_custom_command(
        counting("args", Arc::default(), json!(1))
            .arg(CustomCommandArg::string("x"))
            .arg(CustomCommandArg::string("x")),
    );
    assert!(matches!(
        result,
        Err(ClientError::CustomCommand(CustomCommandError::DuplicateArg { .. }))
    ));
    assert_eq!(client.custom_command_count(), 0);
}

/// **VALUE**: Verifies that a rejected re-registration leaves the existing command in place.
#[test]
fn given_registered_command_when_invalid_replacement_rejected_then_original_kept() {
    // GIVEN: A registered command
    let client = Client::new();
    client
        .register_custom_command(counting("foo", Arc::default(), json!(1)))
        .expect("registration");

    // WHEN: Re-registering the name without a handler
    let result = client.register_custom_command(CustomCommand::new("foo"));

    // THEN: The original survives and nothing extra was queued besides its register
    assert!(result.is_err());
    assert_eq!(client.custom_command_count(), 1);
    assert_eq!(client.queued(), 1);
}

/// **VALUE**: Verifies the unregister handle removes the command and tells the inspector.
#[tokio::test]
async fn given_registration_handle_when_unregistered_then_command_removed_and_announced() {
    // GIVEN: A ready client with one command
    let factory = MockSocketFactory::default();
    let (client, link) = ready_client(&factory, factory.options()).await;
    let handle = client
        .register_custom_command(counting("foo", Arc::default(), json!(1)))
        .expect("registration");
    let id = handle.id();

    // WHEN: Unregistering through the handle
    handle.unregister();

    // THEN: The command is gone and the inspector was told
    assert_eq!(client.custom_command_count(), 0);
    let unregister = link.frames_of("customCommand.unregister");
    assert_eq!(unregister.len(), 1);
    assert_eq!(unregister[0]["payload"], json!({ "id": id, "command": "foo" }));
}

#[test]
fn given_handler_results_when_checked_then_only_truthy_values_are_reported() {
    assert!(!is_reportable(&Value::Null));
    assert!(!is_reportable(&json!(false)));
    assert!(!is_reportable(&json!(0)));
    assert!(!is_reportable(&json!("")));
    assert!(is_reportable(&json!("ok")));
    assert!(is_reportable(&json!(7)));
    assert!(is_reportable(&json!([])));
    assert!(is_reportable(&json!({})));
}
