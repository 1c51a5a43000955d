//! Configuration surface a host adapter hands to [`Client::configure`](crate::Client::configure).

use crate::error::ConfigError;
use crate::plugin::PluginCreator;
use crate::plugins::core_plugins;
use crate::socket::SocketFactory;

use protocol::{DEFAULT_PORT, ServerMessage};

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{self, BoxFuture};
use serde_json::{Map, Value};
use url::Url;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_NAME: &str = "client-core";

pub type CommandHook = Arc<dyn Fn(&ServerMessage) + Send + Sync>;
pub type LifecycleHook = Arc<dyn Fn() + Send + Sync>;

/// Where the logical client id lives between runs.
///
/// The server mints an id on first contact and pushes it back with
/// `setClientId`; persisting it and returning it from `get_client_id` on the
/// next handshake keeps the application's identity across reconnects.
pub trait IdentityProvider: Send + Sync {
    fn get_client_id(&self, name: &str) -> BoxFuture<'static, Option<String>>;

    fn set_client_id(&self, _client_id: &str) {}
}

/// Never remembers anything; every handshake asks the server for a new id.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

impl IdentityProvider for NoIdentity {
    fn get_client_id(&self, _name: &str) -> BoxFuture<'static, Option<String>> {
        Box::pin(future::ready(None))
    }
}

/// Keeps the id in memory for the life of the process.
#[derive(Debug, Default)]
pub struct InMemoryIdentity {
    client_id: Mutex<Option<String>>,
}

impl InMemoryIdentity {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            client_id: Mutex::new(client_id),
        }
    }

    pub fn client_id(&self) -> Option<String> {
        self.client_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IdentityProvider for InMemoryIdentity {
    fn get_client_id(&self, _name: &str) -> BoxFuture<'static, Option<String>> {
        Box::pin(future::ready(self.client_id()))
    }

    fn set_client_id(&self, client_id: &str) {
        *self.client_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(client_id.to_string());
    }
}

#[derive(Clone)]
pub struct ClientOptions {
    /// `None` is accepted here and makes `connect()` fail its handle at once.
    pub host: Option<String>,
    pub port: u16,
    /// Selects `wss` over `ws`.
    pub secure: bool,
    pub name: String,
    pub environment: Option<String>,
    /// Free-form metadata merged into the handshake.
    pub client: Map<String, Value>,
    pub info: Map<String, Value>,
    pub socket_factory: Option<Arc<dyn SocketFactory>>,
    pub identity: Arc<dyn IdentityProvider>,
    pub plugins: Vec<PluginCreator>,
    pub on_command: Option<CommandHook>,
    pub on_connect: Option<LifecycleHook>,
    pub on_disconnect: Option<LifecycleHook>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: Some(DEFAULT_HOST.to_string()),
            port: DEFAULT_PORT,
            secure: false,
            name: DEFAULT_NAME.to_string(),
            environment: None,
            client: Map::new(),
            info: Map::new(),
            socket_factory: None,
            identity: Arc::new(NoIdentity),
            plugins: core_plugins(),
            on_command: None,
            on_connect: None,
            on_disconnect: None,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("name", &self.name)
            .field("environment", &self.environment)
            .field("socket_factory", &self.socket_factory.is_some())
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    pub fn with_socket_factory(mut self, factory: impl SocketFactory + 'static) -> Self {
        self.socket_factory = Some(Arc::new(factory));
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Address the socket factory is asked to open, if a host is set.
    pub fn url(&self) -> Result<Option<Url>, ConfigError> {
        let Some(host) = self.host.as_deref() else {
            return Ok(None);
        };

        Url::parse(&format!("{}://{}:{}", self.scheme(), host, self.port))
            .map(Some)
            .map_err(|e| ConfigError::invalid_host(format!("{host}: {e}")))
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] for a missing socket factory, an empty host,
    /// port 0, or a host that does not form a valid URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_factory.is_none() {
            return Err(ConfigError::invalid_socket_factory());
        }

        if let Some(host) = &self.host
            && host.trim().is_empty()
        {
            return Err(ConfigError::invalid_host("host cannot be empty"));
        }

        if self.port == 0 {
            return Err(ConfigError::invalid_port(self.port));
        }

        self.url()?;
        Ok(())
    }
}
