use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PluginError {
    #[error("Reserved Feature Error: feature {feature} is a reserved name {location}")]
    ReservedFeature {
        feature: String,
        location: ErrorLocation,
    },

    #[error("Missing Capability Error: {message} {location}")]
    MissingCapability {
        message: String,
        location: ErrorLocation,
    },
}

impl PluginError {
    #[track_caller]
    pub fn reserved_feature(feature: impl Into<String>) -> Self {
        PluginError::ReservedFeature {
            feature: feature.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn missing_capability(plugin: &str) -> Self {
        PluginError::MissingCapability {
            message: format!(
                "This client has not had the {plugin} plugin applied to it. \
                 Make sure that you add the plugin before using these features."
            ),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
