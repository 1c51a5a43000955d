//! Capability composer.
//!
//! Feature modules implement [`Plugin`] and are installed onto a [`Client`]
//! with [`Client::use_plugin`]. Each installed plugin is kept twice:
//!
//! - in registration order, so lifecycle hooks fire in the order plugins were added
//! - by type, so callers reach a feature set through `client.capability::<T>()`
//!   or `client.require::<T>()` instead of probing for functions at runtime
//!
//! Feature names are checked against the client's own verbs when a plugin is
//! installed. A name that shadows a core verb is a configuration error.

use crate::client::Client;
use crate::error::PluginError;

use protocol::ServerMessage;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A feature module attached to a client.
///
/// Every hook has an empty default body.
pub trait Plugin: Send + Sync + 'static {
    /// Names of the functions this plugin exposes.
    fn features(&self) -> &'static [&'static str] {
        &[]
    }

    /// Every inbound message, after the options-level hook.
    fn on_command(&self, _command: &ServerMessage) {}

    fn on_connect(&self) {}

    fn on_disconnect(&self) {}

    /// Runs once, right after the plugin is installed.
    fn on_plugin(&self, _client: &Client) {}
}

/// A plugin callers can require by type.
pub trait Capability: Plugin {
    /// Human name used in "missing plugin" errors.
    const NAME: &'static str;
}

/// The client's own verbs. Plugins may not expose features under these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedFeature {
    Configure,
    Connect,
    Connected,
    Options,
    Plugins,
    Send,
    Socket,
    StartTimer,
    Use,
}

impl ReservedFeature {
    pub const ALL: [ReservedFeature; 9] = [
        ReservedFeature::Configure,
        ReservedFeature::Connect,
        ReservedFeature::Connected,
        ReservedFeature::Options,
        ReservedFeature::Plugins,
        ReservedFeature::Send,
        ReservedFeature::Socket,
        ReservedFeature::StartTimer,
        ReservedFeature::Use,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReservedFeature::Configure => "configure",
            ReservedFeature::Connect => "connect",
            ReservedFeature::Connected => "connected",
            ReservedFeature::Options => "options",
            ReservedFeature::Plugins => "plugins",
            ReservedFeature::Send => "send",
            ReservedFeature::Socket => "socket",
            ReservedFeature::StartTimer => "start_timer",
            ReservedFeature::Use => "use",
        }
    }

    /// Matches `name` regardless of case or `snake_case` vs `camelCase`.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self::ALL
            .into_iter()
            .find(|reserved| reserved.as_str().replace('_', "") == normalized)
    }
}

impl fmt::Display for ReservedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Factory building one plugin for a client; the unit of `ClientOptions::plugins`.
#[derive(Clone)]
pub struct PluginCreator(Arc<dyn Fn(&Client) -> PreparedPlugin + Send + Sync>);

impl PluginCreator {
    pub fn new<P, F>(factory: F) -> Self
    where
        P: Plugin,
        F: Fn(&Client) -> P + Send + Sync + 'static,
    {
        Self(Arc::new(move |client: &Client| {
            let plugin = factory(client);
            PreparedPlugin {
                features: plugin.features(),
                install: Box::new(move |client: &Client| {
                    client.install_plugin(plugin);
                }),
            }
        }))
    }

    pub(crate) fn prepare(&self, client: &Client) -> PreparedPlugin {
        (self.0)(client)
    }
}

/// A built plugin whose feature names have not been checked yet.
pub(crate) struct PreparedPlugin {
    features: &'static [&'static str],
    install: Box<dyn FnOnce(&Client) + Send>,
}

impl PreparedPlugin {
    pub(crate) fn features(&self) -> &'static [&'static str] {
        self.features
    }

    pub(crate) fn install(self, client: &Client) {
        (self.install)(client);
    }
}

impl fmt::Debug for PluginCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PluginCreator")
    }
}

#[derive(Default)]
pub(crate) struct PluginRegistry {
    hooks: Vec<Arc<dyn Plugin>>,
    capabilities: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Feature name to the type that currently provides it. Last install wins.
    features: HashMap<&'static str, TypeId>,
}

impl PluginRegistry {
    pub(crate) fn check_features(features: &[&str]) -> Result<(), PluginError> {
        match features.iter().find(|name| ReservedFeature::parse(name).is_some()) {
            Some(name) => Err(PluginError::reserved_feature(*name)),
            None => Ok(()),
        }
    }

    pub(crate) fn insert<P: Plugin>(&mut self, plugin: Arc<P>) {
        let type_id = TypeId::of::<P>();
        for name in plugin.features() {
            self.features.insert(*name, type_id);
        }
        self.hooks.push(plugin.clone());
        self.capabilities.insert(type_id, plugin);
    }

    pub(crate) fn get<P: Plugin>(&self) -> Option<Arc<P>> {
        self.capabilities
            .get(&TypeId::of::<P>())
            .cloned()
            .and_then(|plugin| plugin.downcast::<P>().ok())
    }

    pub(crate) fn has_feature(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub(crate) fn hooks(&self) -> Vec<Arc<dyn Plugin>> {
        self.hooks.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.hooks.clear();
        self.capabilities.clear();
        self.features.clear();
    }
}
