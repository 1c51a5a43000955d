use crate::client::{Client, WeakClient};
use crate::plugin::{Capability, Plugin};

use protocol::state::StateValueChange;
use protocol::{CommandType, Payload};

/// Replies to the inspector's state queries.
#[derive(Debug)]
pub struct StateResponses {
    client: WeakClient,
}

impl StateResponses {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.downgrade(),
        }
    }

    pub fn state_action_complete(&self, name: &str, action: impl Into<Payload>, important: bool) {
        let payload = Payload::object([("name", Payload::from(name)), ("action", action.into())]);
        self.client
            .send(CommandType::StateActionComplete, payload, important);
    }

    pub fn state_values_response(&self, path: Option<&str>, value: impl Into<Payload>, valid: bool) {
        let payload = Payload::object([
            ("path", Payload::from(path)),
            ("value", value.into()),
            ("valid", Payload::from(valid)),
        ]);
        self.client
            .send(CommandType::StateValuesResponse, payload, false);
    }

    pub fn state_keys_response(&self, path: Option<&str>, keys: Vec<String>, valid: bool) {
        let payload = Payload::object([
            ("path", Payload::from(path)),
            ("keys", Payload::from(keys)),
            ("valid", Payload::from(valid)),
        ]);
        self.client
            .send(CommandType::StateKeysResponse, payload, false);
    }

    /// Sends nothing for an empty change list.
    pub fn state_values_change(&self, changes: Vec<StateValueChange>) {
        if changes.is_empty() {
            return;
        }
        let changes: Vec<Payload> = changes
            .into_iter()
            .map(|change| {
                Payload::object([
                    ("path", Payload::from(change.path)),
                    ("value", Payload::from(change.value)),
                ])
            })
            .collect();
        self.client.send(
            CommandType::StateValuesChange,
            Payload::object([("changes", Payload::from(changes))]),
            false,
        );
    }

    pub fn state_backup_response(&self, state: impl Into<Payload>) {
        self.client.send(
            CommandType::StateBackupResponse,
            Payload::object([("state", state.into())]),
            false,
        );
    }
}

impl Plugin for StateResponses {
    fn features(&self) -> &'static [&'static str] {
        &[
            "state_action_complete",
            "state_values_response",
            "state_keys_response",
            "state_values_change",
            "state_backup_response",
        ]
    }
}

impl Capability for StateResponses {
    const NAME: &'static str = "state responses";
}
