use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ProtocolError {
    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}

impl ProtocolError {
    #[track_caller]
    pub fn decode(message: impl Into<String>) -> Self {
        ProtocolError::Decode {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn encode(message: impl Into<String>) -> Self {
        ProtocolError::Encode {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
