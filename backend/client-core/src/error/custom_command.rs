use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CustomCommandError {
    #[error("Missing Command Error: {message} {location}")]
    MissingCommand {
        message: String,
        location: ErrorLocation,
    },

    #[error("Missing Handler Error: {message} {location}")]
    MissingHandler {
        message: String,
        location: ErrorLocation,
    },

    #[error("Arg Missing Name Error: {message} {location}")]
    ArgMissingName {
        message: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Arg Error: {message} {location}")]
    DuplicateArg {
        message: String,
        location: ErrorLocation,
    },
}

impl CustomCommandError {
    #[track_caller]
    pub fn missing_command() -> Self {
        CustomCommandError::MissingCommand {
            message: "A command is required".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn missing_handler(command: &str) -> Self {
        CustomCommandError::MissingHandler {
            message: format!("A handler is required for command \"{command}\""),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn arg_missing_name(command: &str) -> Self {
        CustomCommandError::ArgMissingName {
            message: format!("An arg on the command \"{command}\" is missing a name"),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn duplicate_arg(command: &str, arg: &str) -> Self {
        CustomCommandError::DuplicateArg {
            message: format!("An arg with the name \"{arg}\" already exists in the command \"{command}\""),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
