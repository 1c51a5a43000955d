//! State-inspection payloads the server interprets on receipt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValueChange {
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

/// `state.values.change`: the current values of every subscribed path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateValuesChangePayload {
    #[serde(default)]
    pub changes: Vec<StateValueChange>,
}

impl StateValuesChangePayload {
    pub fn paths(&self) -> Vec<String> {
        self.changes.iter().map(|change| change.path.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateActionCompletePayload {
    pub name: String,
    pub action: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValuesResponsePayload {
    pub path: Option<String>,
    pub value: Value,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateKeysResponsePayload {
    pub path: Option<String>,
    pub keys: Vec<String>,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBackupResponsePayload {
    pub state: Value,
}
