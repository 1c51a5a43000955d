//! Session state machine of one instrumented application.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured --configure--> Idle --connect--> Connecting --open--> HandshakeSent
//!                                                   |                     |
//!                                                   |           identity resolved,
//!                                                   |           client.intro written
//!                                                   v                     v
//!                                                 Failed <--close/error-- Ready
//! ```
//!
//! `close()` moves any live phase to `Closed`. Both `Closed` and `Failed`
//! accept a fresh `connect()`.
//!
//! # Ordering
//!
//! Every envelope is stamped and encoded at `send()` time. Until the session is
//! `Ready` the encoded frame goes to a FIFO queue. The transition to `Ready`
//! happens under the session lock: the handshake is written first, then the
//! queue is drained, and only then can a concurrent `send()` reach the socket.
//!
//! # Socket events
//!
//! Each `connect()` bumps a generation counter and spawns a task that feeds the
//! link's events back into the client. Events tagged with an old generation are
//! ignored, so a late close from a replaced socket cannot demote the new one.

use crate::custom_command::{
    CustomCommand, CustomCommandHandle, CustomCommandRegistry, is_reportable,
};
use crate::error::{ClientError, ConfigError, ConnectionError, PluginError};
use crate::options::ClientOptions;
use crate::plugin::{Capability, Plugin, PluginRegistry, PreparedPlugin};
use crate::socket::{SocketEvent, SocketSink};
use crate::stopwatch::Stopwatch;

use protocol::custom_command::{CustomCommandInvocation, CustomCommandResponsePayload};
use protocol::{CommandType, Envelope, Payload, ServerMessage, decode, encode};

use std::collections::VecDeque;
use std::fmt;
use std::future::IntoFuture;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};
use std::time::SystemTime;

use futures_util::future::BoxFuture;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{broadcast, watch};

/// Reported to the inspector in every handshake.
pub const CLIENT_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

const INBOUND_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unconfigured,
    Idle,
    Connecting,
    HandshakeSent,
    Ready,
    Closed,
    Failed,
}

#[derive(Debug, Clone)]
enum ConnectState {
    Pending,
    Open,
    Failed(ConnectionError),
}

/// Completion handle created by [`Client::connect`].
///
/// Resolves when the socket opens. Fails if the socket closes first, if
/// `close()` is called first, or if no host is configured. Await it directly
/// or call [`ConnectHandle::wait`].
#[derive(Debug)]
pub struct ConnectHandle {
    rx: watch::Receiver<ConnectState>,
}

impl ConnectHandle {
    pub async fn wait(mut self) -> Result<(), ConnectionError> {
        loop {
            let state = self.rx.borrow_and_update().clone();
            match state {
                ConnectState::Open => return Ok(()),
                ConnectState::Failed(e) => return Err(e),
                ConnectState::Pending => {}
            }

            if self.rx.changed().await.is_err() {
                return Err(ConnectionError::failed());
            }
        }
    }
}

impl IntoFuture for ConnectHandle {
    type Output = Result<(), ConnectionError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

/// Arguments of [`Client::display`].
#[derive(Debug, Clone, Default)]
pub struct DisplayConfig {
    pub name: String,
    pub value: Payload,
    pub preview: Option<String>,
    pub image: Option<String>,
    pub important: bool,
}

struct Session {
    options: Option<ClientOptions>,
    phase: Phase,
    socket: Option<Box<dyn SocketSink>>,
    send_queue: VecDeque<String>,
    last_message_at: SystemTime,
    generation: u64,
    connected: Option<watch::Sender<ConnectState>>,
}

impl Session {
    fn new() -> Self {
        Self {
            options: None,
            phase: Phase::Unconfigured,
            socket: None,
            send_queue: VecDeque::new(),
            last_message_at: SystemTime::now(),
            generation: 0,
            connected: None,
        }
    }

    /// Settles the pending connect handle. A settled handle never changes.
    fn settle(&self, state: ConnectState) {
        if let Some(tx) = &self.connected {
            tx.send_if_modified(|current| {
                if matches!(current, ConnectState::Pending) {
                    *current = state;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Builds and encodes an envelope, advancing the delta clock.
    fn stamp(
        &mut self,
        command_type: CommandType,
        payload: &Payload,
        important: bool,
    ) -> Option<String> {
        let now = SystemTime::now();
        let delta_time = delta_millis(self.last_message_at, now);
        self.last_message_at = now;

        let envelope = Envelope::new(command_type, payload, important, now, delta_time);
        match encode(&envelope) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Dropping {} message: {}", envelope.command_type, e);
                None
            }
        }
    }

    /// Hands a frame to the socket. A failed write demotes the session and
    /// drops the frame.
    fn write(&mut self, frame: String) -> bool {
        let result = match &self.socket {
            Some(socket) => socket.send(frame),
            None => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "An error occurred communicating with the inspector, message dropped: {}",
                    e
                );
                self.phase = Phase::Failed;
                false
            }
        }
    }
}

struct Inner {
    session: Mutex<Session>,
    plugins: RwLock<PluginRegistry>,
    commands: Mutex<CustomCommandRegistry>,
    inbound: broadcast::Sender<ServerMessage>,
}

/// Handle to one application-side session.
///
/// Cheap to clone; every clone drives the same session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

/// Non-owning handle held by plugins and background tasks.
#[derive(Clone, Default)]
pub struct WeakClient {
    inner: Weak<Inner>,
}

impl Client {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(Session::new()),
                plugins: RwLock::new(PluginRegistry::default()),
                commands: Mutex::new(CustomCommandRegistry::default()),
                inbound,
            }),
        }
    }

    /// Creates a client and applies `options` to it.
    ///
    /// # Errors
    ///
    /// See [`Client::configure`].
    pub fn create(options: ClientOptions) -> Result<Self, ClientError> {
        let client = Self::new();
        client.configure(options)?;
        Ok(client)
    }

    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn plugins(&self) -> RwLockReadGuard<'_, PluginRegistry> {
        self.inner
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn plugins_mut(&self) -> RwLockWriteGuard<'_, PluginRegistry> {
        self.inner
            .plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn commands(&self) -> MutexGuard<'_, CustomCommandRegistry> {
        self.inner
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates and stores `options`, then installs `options.plugins` in order.
    ///
    /// Plugins installed by an earlier `configure` are removed first. The
    /// session itself is untouched: reconnect with `close()` then `connect()`.
    /// Every plugin is built and checked before anything is replaced, so a
    /// failed call leaves the previous options and plugins in place.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for invalid options and
    /// [`ClientError::Plugin`] if a plugin exposes a reserved feature name.
    pub fn configure(&self, options: ClientOptions) -> Result<&Self, ClientError> {
        options.validate()?;
        let prepared: Vec<PreparedPlugin> = options
            .plugins
            .iter()
            .map(|creator| creator.prepare(self))
            .collect();
        for plugin in &prepared {
            PluginRegistry::check_features(plugin.features())?;
        }

        {
            let mut session = self.session();
            session.options = Some(options);
            if session.phase == Phase::Unconfigured {
                session.phase = Phase::Idle;
            }
        }

        let count = prepared.len();
        self.plugins_mut().clear();
        for plugin in prepared {
            plugin.install(self);
        }

        info!("Client configured with {} plugins", count);
        Ok(self)
    }

    pub fn options(&self) -> Option<ClientOptions> {
        self.session().options.clone()
    }

    pub fn phase(&self) -> Phase {
        self.session().phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// Envelopes encoded but not yet handed to a socket.
    pub fn queued(&self) -> usize {
        self.session().send_queue.len()
    }

    /// Opens a socket through the configured factory.
    ///
    /// Any previous socket is closed first. With no host configured the
    /// returned handle is already failed and no socket is opened.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] before `configure()`.
    pub fn connect(&self) -> Result<ConnectHandle, ClientError> {
        let mut session = self.session();
        let options = session
            .options
            .clone()
            .ok_or_else(|| ConfigError::not_configured())?;

        if let Some(previous) = session.socket.take() {
            previous.close();
        }
        session.settle(ConnectState::Failed(ConnectionError::closed()));

        session.generation += 1;
        let (tx, rx) = watch::channel(ConnectState::Pending);
        session.connected = Some(tx);
        let handle = ConnectHandle { rx };

        let Some(url) = options.url()? else {
            info!("Host is not configured, skipping connect");
            session.phase = Phase::Failed;
            session.settle(ConnectState::Failed(ConnectionError::host_not_configured()));
            return Ok(handle);
        };

        let Some(factory) = options.socket_factory else {
            return Err(ConfigError::invalid_socket_factory().into());
        };

        info!("Connecting to {}", url);
        let connection = factory.create(&url);
        session.socket = Some(connection.sink);
        session.phase = Phase::Connecting;
        let generation = session.generation;
        drop(session);

        tokio::spawn(drive(self.downgrade(), generation, connection.events));
        Ok(handle)
    }

    /// Closes the socket and fails a pending connect handle. Idempotent.
    pub fn close(&self) -> &Self {
        let mut session = self.session();

        if let Some(socket) = session.socket.take() {
            socket.close();
            info!("Client closed");
        }

        if matches!(
            session.phase,
            Phase::Connecting | Phase::HandshakeSent | Phase::Ready | Phase::Failed
        ) {
            session.phase = Phase::Closed;
        }

        session.settle(ConnectState::Failed(ConnectionError::closed()));
        self
    }

    /// Resolves once the socket is open.
    ///
    /// # Errors
    ///
    /// Fails with [`ConnectionError::NotConnected`] if `connect()` was never
    /// called, otherwise with whatever the current connect handle failed with.
    pub async fn wait_for_connect(&self) -> Result<(), ConnectionError> {
        let handle = {
            let session = self.session();
            if session.phase == Phase::Ready {
                return Ok(());
            }
            match &session.connected {
                Some(tx) => ConnectHandle { rx: tx.subscribe() },
                None => return Err(ConnectionError::not_connected()),
            }
        };

        handle.wait().await
    }

    /// Sends one envelope, or queues it until the session is ready.
    pub fn send(
        &self,
        command_type: impl Into<CommandType>,
        payload: impl Into<Payload>,
        important: bool,
    ) {
        let command_type = command_type.into();
        let payload = payload.into();

        let mut session = self.session();
        let Some(frame) = session.stamp(command_type.clone(), &payload, important) else {
            return;
        };

        if session.phase == Phase::Ready {
            session.write(frame);
        } else {
            debug!("Queueing {} until the session is ready", command_type);
            session.send_queue.push_back(frame);
        }
    }

    /// Sends a typed payload.
    pub fn send_serialized<T: Serialize>(
        &self,
        command_type: impl Into<CommandType>,
        payload: &T,
        important: bool,
    ) {
        let command_type = command_type.into();
        match serde_json::to_value(payload) {
            Ok(value) => self.send(command_type, value, important),
            Err(e) => warn!("Dropping {} message: {}", command_type, e),
        }
    }

    pub fn display(&self, config: DisplayConfig) {
        let value = if config.value.is_undefined() {
            Payload::Null
        } else {
            config.value
        };

        let payload = Payload::object([
            ("name", Payload::from(config.name)),
            ("value", value),
            ("preview", Payload::from(config.preview)),
            ("image", Payload::from(config.image)),
        ]);

        self.send(CommandType::Display, payload, config.important);
    }

    pub fn start_timer(&self) -> Stopwatch {
        Stopwatch::start()
    }

    /// Inbound messages, after every hook has seen them.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.inner.inbound.subscribe()
    }

    /// Installs a plugin and returns the shared instance.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ReservedFeature`] if any feature name shadows a
    /// core verb. Nothing is installed in that case.
    pub fn use_plugin<P: Plugin>(&self, plugin: P) -> Result<Arc<P>, PluginError> {
        PluginRegistry::check_features(plugin.features())?;
        Ok(self.install_plugin(plugin))
    }

    pub(crate) fn install_plugin<P: Plugin>(&self, plugin: P) -> Arc<P> {
        let plugin = Arc::new(plugin);
        self.plugins_mut().insert(plugin.clone());
        debug!("Installed plugin with features {:?}", plugin.features());

        plugin.on_plugin(self);
        plugin
    }

    pub fn capability<P: Plugin>(&self) -> Option<Arc<P>> {
        self.plugins().get::<P>()
    }

    /// Like [`Client::capability`], failing with a descriptive error when absent.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::MissingCapability`] naming the plugin.
    pub fn require<P: Capability>(&self) -> Result<Arc<P>, PluginError> {
        self.capability::<P>()
            .ok_or_else(|| PluginError::missing_capability(P::NAME))
    }

    pub fn has<P: Plugin>(&self) -> bool {
        self.capability::<P>().is_some()
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.plugins().has_feature(name)
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins().len()
    }

    fn plugin_hooks(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins().hooks()
    }

    /// Announces a command to the inspector.
    ///
    /// An existing command with the same name is unregistered first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CustomCommand`] for a missing name or handler, or
    /// for an argument list with a nameless or duplicate entry.
    pub fn register_custom_command(
        &self,
        command: CustomCommand,
    ) -> Result<CustomCommandHandle, ClientError> {
        let registration = self.commands().register(command)?;

        for stale in &registration.evicted {
            self.send_serialized(CommandType::CustomCommandUnregister, stale, false);
        }
        self.send_serialized(
            CommandType::CustomCommandRegister,
            &registration.registered,
            false,
        );

        Ok(CustomCommandHandle {
            client: self.downgrade(),
            id: registration.registered.id,
            command: registration.registered.command,
        })
    }

    pub(crate) fn unregister_custom_command(&self, id: u64) {
        let removed = self.commands().unregister(id);
        if let Some(payload) = removed {
            self.send_serialized(CommandType::CustomCommandUnregister, &payload, false);
        }
    }

    pub fn custom_command_count(&self) -> usize {
        self.commands().len()
    }

    fn handle_open(&self, generation: u64) {
        let options = {
            let mut session = self.session();
            if session.generation != generation || session.phase != Phase::Connecting {
                return;
            }
            session.phase = Phase::HandshakeSent;
            session.options.clone()
        };
        let Some(options) = options else {
            return;
        };

        info!("Socket open, resolving client id");

        if let Some(hook) = &options.on_connect {
            hook();
        }
        for plugin in self.plugin_hooks() {
            plugin.on_connect();
        }

        self.session().settle(ConnectState::Open);

        let client = self.downgrade();
        let identity = options.identity.clone();
        let name = options.name.clone();
        tokio::spawn(async move {
            let client_id = identity.get_client_id(&name).await;
            if let Some(client) = client.upgrade() {
                client.complete_handshake(generation, client_id);
            }
        });
    }

    fn complete_handshake(&self, generation: u64, client_id: Option<String>) {
        let mut session = self.session();
        if session.generation != generation || session.phase != Phase::HandshakeSent {
            return;
        }

        let intro = match session.options.as_ref() {
            Some(options) => intro_payload(options, client_id),
            None => return,
        };

        session.phase = Phase::Ready;
        info!(
            "Session ready, flushing {} queued messages",
            session.send_queue.len()
        );

        let Some(frame) = session.stamp(CommandType::ClientIntro, &intro, false) else {
            return;
        };
        if !session.write(frame) {
            return;
        }

        while let Some(frame) = session.send_queue.pop_front() {
            if !session.write(frame) {
                break;
            }
        }
    }

    fn handle_message(&self, generation: u64, frame: &[u8]) {
        let hooks = {
            let session = self.session();
            if session.generation != generation {
                return;
            }
            session
                .options
                .as_ref()
                .map(|options| (options.on_command.clone(), options.identity.clone()))
        };
        let Some((on_command, identity)) = hooks else {
            return;
        };

        let message: ServerMessage = match decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping malformed inbound frame: {}", e);
                return;
            }
        };
        debug!("Received {}", message.command_type);

        if let Some(hook) = &on_command {
            hook(&message);
        }
        for plugin in self.plugin_hooks() {
            plugin.on_command(&message);
        }

        match &message.command_type {
            CommandType::Custom => self.dispatch_custom_command(&message.payload),
            CommandType::SetClientId => match message.payload.as_str() {
                Some(client_id) => identity.set_client_id(client_id),
                None => warn!("Ignoring setClientId without a string payload"),
            },
            _ => {}
        }

        let _ = self.inner.inbound.send(message);
    }

    fn dispatch_custom_command(&self, payload: &Value) {
        let invocation: CustomCommandInvocation = match serde_json::from_value(payload.clone()) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!("Ignoring malformed custom command: {}", e);
                return;
            }
        };

        let handlers = self.commands().handlers_for(invocation.command());
        if handlers.is_empty() {
            debug!("No handler registered for {}", invocation.command());
            return;
        }

        for (command, handler) in handlers {
            let args = invocation.args();
            let client = self.downgrade();
            tokio::spawn(async move {
                let Some(result) = handler(args).await else {
                    return;
                };
                if !is_reportable(&result) {
                    return;
                }
                if let Some(client) = client.upgrade() {
                    client.send_serialized(
                        CommandType::CustomCommandResponse,
                        &CustomCommandResponsePayload {
                            command,
                            payload: result,
                        },
                        false,
                    );
                }
            });
        }
    }

    fn handle_close(&self, generation: u64) {
        let on_disconnect = {
            let mut session = self.session();
            if session.generation != generation {
                return;
            }
            session.socket = None;
            if session.phase != Phase::Closed {
                session.phase = Phase::Failed;
            }
            session.settle(ConnectState::Failed(ConnectionError::failed()));
            session
                .options
                .as_ref()
                .and_then(|options| options.on_disconnect.clone())
        };

        info!("Socket closed");

        if let Some(hook) = on_disconnect {
            hook();
        }
        for plugin in self.plugin_hooks() {
            plugin.on_disconnect();
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl WeakClient {
    pub fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }

    /// Sends through the client if it is still alive.
    pub fn send(
        &self,
        command_type: impl Into<CommandType>,
        payload: impl Into<Payload>,
        important: bool,
    ) {
        if let Some(client) = self.upgrade() {
            client.send(command_type, payload, important);
        }
    }

    pub fn send_serialized<T: Serialize>(
        &self,
        command_type: impl Into<CommandType>,
        payload: &T,
        important: bool,
    ) {
        if let Some(client) = self.upgrade() {
            client.send_serialized(command_type, payload, important);
        }
    }
}

impl fmt::Debug for WeakClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakClient")
    }
}

/// Milliseconds from `previous` to `now`, zero if the clock went backwards.
pub(crate) fn delta_millis(previous: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(previous)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn intro_payload(options: &ClientOptions, client_id: Option<String>) -> Payload {
    let mut fields = Map::new();

    if let Some(environment) = &options.environment {
        fields.insert("environment".to_string(), Value::from(environment.as_str()));
    }
    fields.extend(options.client.clone());
    fields.extend(options.info.clone());
    fields.insert("name".to_string(), Value::from(options.name.as_str()));
    fields.insert(
        "clientId".to_string(),
        client_id
            .filter(|id| !id.is_empty())
            .map_or(Value::Null, Value::from),
    );
    fields.insert(
        "clientCoreVersion".to_string(),
        Value::from(CLIENT_CORE_VERSION),
    );

    Payload::from(Value::Object(fields))
}

async fn drive(client: WeakClient, generation: u64, mut events: UnboundedReceiver<SocketEvent>) {
    while let Some(event) = events.recv().await {
        let Some(client) = client.upgrade() else {
            return;
        };

        match event {
            SocketEvent::Open => client.handle_open(generation),
            SocketEvent::Message(frame) => client.handle_message(generation, &frame),
            SocketEvent::Close => {
                client.handle_close(generation);
                return;
            }
        }
    }

    if let Some(client) = client.upgrade() {
        client.handle_close(generation);
    }
}
