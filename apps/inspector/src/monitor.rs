//! Logs every server event in a line a human can scan.

use protocol::{Command, CommandType};
use server_core::ServerEvent;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

/// One-line description of an event.
pub fn describe(event: &ServerEvent) -> String {
    match event {
        ServerEvent::Start => "Inspector started".to_string(),
        ServerEvent::Stop => "Inspector stopped".to_string(),
        ServerEvent::PortUnavailable(port) => format!("Port {port} is unavailable"),
        ServerEvent::Connect(partial) => format!(
            "Connection {} opened from {}",
            partial.id,
            partial.address.as_deref().unwrap_or("unknown address")
        ),
        ServerEvent::ConnectionEstablished(connection) => format!(
            "Client {} ({}) established on connection {}",
            connection.client_id,
            connection.name().unwrap_or("unnamed"),
            connection.id
        ),
        ServerEvent::Disconnect(connection) => format!(
            "Client {} disconnected from connection {}",
            connection.client_id, connection.id
        ),
        ServerEvent::Command(command) => describe_command(command),
    }
}

fn describe_command(command: &Command) -> String {
    let source = match command.client_id.as_deref() {
        Some(client_id) => client_id.to_string(),
        None => format!("connection {}", command.connection_id),
    };
    let marker = if command.important { " !" } else { "" };

    let mut line = format!(
        "#{} {}{} from {}",
        command.message_id, command.command_type, marker, source
    );

    if command.command_type == CommandType::Log
        && let Some(message) = command.payload.get("message").and_then(Value::as_str)
    {
        line.push_str(": ");
        line.push_str(message);
    }

    line
}

/// Logs events until the server's event bus closes.
pub async fn run(mut events: Receiver<ServerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let line = describe(&event);
                match event {
                    ServerEvent::PortUnavailable(_) => warn!("{line}"),
                    ServerEvent::Command(ref command) if !command.important => debug!("{line}"),
                    _ => info!("{line}"),
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Event log skipped {skipped} event(s)"),
            Err(RecvError::Closed) => break,
        }
    }
}
