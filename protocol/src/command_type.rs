//! Registry of envelope type tags.
//!
//! The set is closed for the tags the core and the bundled features know about,
//! and extensible through [`CommandType::Other`]: an unknown tag survives a
//! decode/encode cycle unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! command_types {
    ($($(#[$doc:meta])* $variant:ident => $tag:literal),+ $(,)?) => {
        /// Tag selecting the payload schema of an envelope.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum CommandType {
            $($(#[$doc])* $variant,)+
            /// A tag outside the known registry, kept verbatim.
            Other(String),
        }

        impl CommandType {
            /// Wire spelling of the tag.
            pub fn as_str(&self) -> &str {
                match self {
                    $(CommandType::$variant => $tag,)+
                    CommandType::Other(tag) => tag,
                }
            }

            pub fn parse(tag: &str) -> Self {
                match tag {
                    $($tag => CommandType::$variant,)+
                    other => CommandType::Other(other.to_string()),
                }
            }
        }
    };
}

command_types! {
    ApiRequest => "api.request",
    ApiResponse => "api.response",
    AsyncStorageMutation => "asyncStorage.mutation",
    Benchmark => "benchmark.report",
    /// Handshake sent by an application right after its socket opens.
    ClientIntro => "client.intro",
    Display => "display",
    Image => "image",
    Log => "log",
    DataWatch => "dataWatch",
    ProfilerRender => "profiler.render",
    ProfilerFps => "profiler.fps",
    SagaTaskComplete => "saga.task.complete",
    StateActionComplete => "state.action.complete",
    StateKeysResponse => "state.keys.response",
    StateValuesChange => "state.values.change",
    StateValuesResponse => "state.values.response",
    StateBackupResponse => "state.backup.response",
    StateBackupRequest => "state.backup.request",
    StateRestoreRequest => "state.restore.request",
    StateActionDispatch => "state.action.dispatch",
    StateValuesSubscribe => "state.values.subscribe",
    StateKeysRequest => "state.keys.request",
    StateValuesRequest => "state.values.request",
    CustomCommandRegister => "customCommand.register",
    CustomCommandUnregister => "customCommand.unregister",
    CustomCommandResponse => "customCommand.response",
    /// Inspector-initiated invocation of a custom command.
    Custom => "custom",
    /// Server-minted logical id pushed back to the application.
    SetClientId => "setClientId",
    Clear => "clear",
    ReplLsResponse => "repl.ls.response",
    ReplExecuteResponse => "repl.execute.response",
    DevtoolsOpen => "devtools.open",
    DevtoolsReload => "devtools.reload",
    EditorOpen => "editor.open",
    Storybook => "storybook",
    Overlay => "overlay",
    ReportIssue => "report.issue",
}

impl From<String> for CommandType {
    fn from(tag: String) -> Self {
        match CommandType::parse(&tag) {
            CommandType::Other(_) => CommandType::Other(tag),
            known => known,
        }
    }
}

impl From<&str> for CommandType {
    fn from(tag: &str) -> Self {
        CommandType::parse(tag)
    }
}

impl From<CommandType> for String {
    fn from(command_type: CommandType) -> Self {
        match command_type {
            CommandType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
