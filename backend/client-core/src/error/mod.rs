pub mod config;
pub mod connection;
pub mod custom_command;
pub mod plugin;
pub mod transport;

pub use config::ConfigError;
pub use connection::ConnectionError;
pub use custom_command::CustomCommandError;
pub use plugin::PluginError;
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    CustomCommand(#[from] CustomCommandError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
