use common::ErrorLocation;

use server_core::{ConfigError, ServerError};

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the inspector host.
#[derive(Debug, Error)]
pub enum InspectorError {
    /// Error from this app
    #[error("Inspector Error: {message} {location}")]
    Inspector {
        message: String,
        location: ErrorLocation,
    },

    /// Config file or environment override is unusable
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// The server failed to start or stop
    #[error("Server Error: {message} {location}")]
    Server {
        message: String,
        location: ErrorLocation,
    },
}

impl InspectorError {
    #[track_caller]
    pub fn inspector(message: impl Into<String>) -> Self {
        InspectorError::Inspector {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        InspectorError::Config {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for InspectorError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        InspectorError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ServerError> for InspectorError {
    #[track_caller]
    fn from(error: ServerError) -> Self {
        InspectorError::Server {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
