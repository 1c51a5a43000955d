//! Where the inspector keeps its files, and environment overrides.

use crate::error::InspectorError;
use crate::logger::LOG_FILE_NAME;

use server_core::InspectorConfig;

use std::path::PathBuf;

/// Directory name under the platform config and data directories.
pub const APP_DIR_NAME: &str = "inspector";

/// Overrides the configured listen port.
pub const PORT_ENV: &str = "INSPECTOR_PORT";

/// `<platform config dir>/inspector`.
pub fn config_dir() -> Result<PathBuf, InspectorError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| InspectorError::inspector("No config directory on this platform"))
}

/// `<platform local data dir>/inspector/logs`.
pub fn log_dir() -> Result<PathBuf, InspectorError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("logs"))
        .ok_or_else(|| InspectorError::inspector("No data directory on this platform"))
}

/// The configured log file, or `inspector.log` in `log_dir`.
pub fn log_file(config: &InspectorConfig, log_dir: PathBuf) -> PathBuf {
    config
        .logging
        .file
        .clone()
        .unwrap_or_else(|| log_dir.join(LOG_FILE_NAME))
}

/// Applies an [`PORT_ENV`] value on top of the configured port.
///
/// # Errors
///
/// Returns [`InspectorError::Config`] if the value is not a port in 1..=65535.
pub fn resolve_port(configured: u16, env_value: Option<&str>) -> Result<u16, InspectorError> {
    let Some(raw) = env_value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(configured);
    };

    match raw.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(InspectorError::config(format!(
            "{PORT_ENV} must be a port between 1 and 65535, got {raw:?}"
        ))),
    }
}
