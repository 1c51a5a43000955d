//! Payload schemas for developer-invoked custom commands.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[default]
    String,
}

/// A selectable value offered for an argument in the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgOption {
    Labeled { label: String, value: String },
    Plain(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCommandArg {
    pub name: String,

    #[serde(rename = "type", default)]
    pub arg_type: ArgType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ArgOption>>,
}

impl CustomCommandArg {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_type: ArgType::String,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Vec<ArgOption>) -> Self {
        self.options = Some(options);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseViewType {
    Auto,
    Table,
}

/// Announces a command to the inspector (`customCommand.register`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCommandRegisterPayload {
    pub id: u64,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<CustomCommandArg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_view_type: Option<ResponseViewType>,
}

/// Withdraws a command (`customCommand.unregister`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCommandUnregisterPayload {
    pub id: u64,
    pub command: String,
}

/// Handler result paired with the command name (`customCommand.response`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCommandResponsePayload {
    pub command: String,
    pub payload: Value,
}

/// Payload of an inbound `custom` envelope: a bare command name or a
/// structured `{command, args}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomCommandInvocation {
    Name(String),
    Structured {
        command: String,
        #[serde(default)]
        args: Option<Map<String, Value>>,
    },
}

impl CustomCommandInvocation {
    pub fn command(&self) -> &str {
        match self {
            CustomCommandInvocation::Name(command) => command,
            CustomCommandInvocation::Structured { command, .. } => command,
        }
    }

    /// Supplied arguments; a bare name carries none.
    pub fn args(&self) -> Map<String, Value> {
        match self {
            CustomCommandInvocation::Name(_) => Map::new(),
            CustomCommandInvocation::Structured { args, .. } => args.clone().unwrap_or_default(),
        }
    }
}
