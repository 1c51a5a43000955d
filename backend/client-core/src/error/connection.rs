use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Reasons a pending connect handle can settle with failure.
///
/// `Clone` because every awaiter of the same handle receives the error.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ConnectionError {
    #[error("Host Not Configured Error: {message} {location}")]
    HostNotConfigured {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connection Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connection Failed Error: {message} {location}")]
    Failed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },
}

impl ConnectionError {
    #[track_caller]
    pub fn host_not_configured() -> Self {
        ConnectionError::HostNotConfigured {
            message: "Host is not configured".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn closed() -> Self {
        ConnectionError::Closed {
            message: "Connection closed".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn failed() -> Self {
        ConnectionError::Failed {
            message: "Connection failed or closed".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_connected() -> Self {
        ConnectionError::NotConnected {
            message: "Not connected. Call connect() first.".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
