use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ServerError {
    #[error("Port Unavailable Error: port {port} is already in use {location}")]
    PortUnavailable { port: u16, location: ErrorLocation },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error("Registry Actor Error: {message} {location}")]
    Actor {
        message: String,
        location: ErrorLocation,
    },
}

impl ServerError {
    #[track_caller]
    pub fn port_unavailable(port: u16) -> Self {
        ServerError::PortUnavailable {
            port,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn actor(message: impl Into<String>) -> Self {
        ServerError::Actor {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IoError> for ServerError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        ServerError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
