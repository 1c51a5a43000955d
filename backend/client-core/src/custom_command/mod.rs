//! Developer-invoked commands the inspector can trigger on this client.

mod registry;

pub(crate) use registry::CustomCommandRegistry;

use crate::client::WeakClient;

use protocol::custom_command::{CustomCommandArg, ResponseViewType};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

/// Runs a command with the arguments the inspector supplied.
///
/// A `None` or falsy result sends no response.
pub type CustomCommandHandler =
    Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

/// Builder for a command registration.
#[derive(Clone, Default)]
pub struct CustomCommand {
    pub(crate) command: String,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) args: Option<Vec<CustomCommandArg>>,
    pub(crate) response_view_type: Option<ResponseViewType>,
    pub(crate) handler: Option<CustomCommandHandler>,
}

impl CustomCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn arg(mut self, arg: CustomCommandArg) -> Self {
        self.args.get_or_insert_with(Vec::new).push(arg);
        self
    }

    pub fn response_view_type(mut self, view: ResponseViewType) -> Self {
        self.response_view_type = Some(view);
        self
    }

    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        self.handler = Some(Arc::new(
            move |args: Map<String, Value>| -> BoxFuture<'static, Option<Value>> {
                Box::pin(handler(args))
            },
        ));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl fmt::Debug for CustomCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCommand")
            .field("command", &self.command)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("args", &self.args)
            .field("response_view_type", &self.response_view_type)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Returned by registration; withdraws the command from the inspector.
#[derive(Debug, Clone)]
pub struct CustomCommandHandle {
    pub(crate) client: WeakClient,
    pub(crate) id: u64,
    pub(crate) command: String,
}

impl CustomCommandHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Removes the command and sends `customCommand.unregister`.
    ///
    /// Does nothing if the command was already replaced or removed.
    pub fn unregister(self) {
        if let Some(client) = self.client.upgrade() {
            client.unregister_custom_command(self.id);
        }
    }
}

/// Mirrors the inspector's notion of an "empty" handler result.
pub(crate) fn is_reportable(result: &Value) -> bool {
    match result {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
