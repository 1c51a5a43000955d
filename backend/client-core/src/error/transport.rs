use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Socket Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Socket Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    #[track_caller]
    pub fn closed() -> Self {
        TransportError::Closed {
            message: "socket is no longer writable".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn send(message: impl Into<String>) -> Self {
        TransportError::Send {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
