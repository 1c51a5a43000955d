use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Socket Factory Error: {message} {location}")]
    InvalidSocketFactory {
        message: String,
        location: ErrorLocation,
    },

    #[error("Host Error: {message} {location}")]
    InvalidHost {
        message: String,
        location: ErrorLocation,
    },

    #[error("Port Error: {message} {location}")]
    InvalidPort {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Configured Error: {message} {location}")]
    NotConfigured {
        message: String,
        location: ErrorLocation,
    },
}

impl ConfigError {
    #[track_caller]
    pub fn invalid_socket_factory() -> Self {
        ConfigError::InvalidSocketFactory {
            message: "a socket factory is required".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_host(message: impl Into<String>) -> Self {
        ConfigError::InvalidHost {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_port(port: u16) -> Self {
        ConfigError::InvalidPort {
            message: format!("port must be between 1 and 65535, got {port}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_configured() -> Self {
        ConfigError::NotConfigured {
            message: "call configure() before connect()".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
