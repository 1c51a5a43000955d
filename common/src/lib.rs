//! Shared building blocks for the inspector workspace.
//!
//! Every error enum in the workspace carries an [`ErrorLocation`] so a log line
//! points at the call site that failed, not at the error constructor.

pub mod error;

pub use error::error_location::ErrorLocation;
