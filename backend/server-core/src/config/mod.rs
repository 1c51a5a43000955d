//! Inspector host settings persisted as `config.json`.

use crate::error::ConfigError;
use crate::options::ServerOptions;

use common::ErrorLocation;

use std::net::IpAddr;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_stale_close_delay_ms")]
    pub stale_close_delay_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            keep_alive_secs: default_keep_alive_secs(),
            stale_close_delay_ms: default_stale_close_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`; the build default when unset.
    pub level: Option<String>,
    /// Log file; the platform log directory when unset.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectorConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ListenerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ListenerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_port() -> u16 {
    protocol::DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_keep_alive_secs() -> u64 {
    30
}
fn default_stale_close_delay_ms() -> u64 {
    500
}

// ============================================
// IMPLEMENTATION
// ============================================

impl InspectorConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: InspectorConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Like [`InspectorConfig::load`], but writes the defaults to disk on first run
    /// so there is a file to edit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing file is invalid or the defaults cannot be saved.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        if config_dir.join(CONFIG_FILE_NAME).exists() {
            return Self::load(config_dir);
        }

        let config = Self::default();
        config.save(config_dir)?;
        Ok(config)
    }

    /// Save config to {config_dir}/config.json via temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation, serialization,
    /// write or rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Port must be between 1 and 65535".to_string(),
            });
        }

        if IpAddr::from_str(&self.server.bind_address).is_err() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid bind address: {}", self.server.bind_address),
            });
        }

        if self.server.keep_alive_secs == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Keep-alive interval must be at least 1 second".to_string(),
            });
        }

        if let Some(ref level) = self.logging.level
            && LevelFilter::from_str(level).is_err()
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid log level: {}", level),
            });
        }

        Ok(())
    }

    /// Configured log level, if any.
    pub fn log_level(&self) -> Option<LevelFilter> {
        self.logging
            .level
            .as_deref()
            .and_then(|level| LevelFilter::from_str(level).ok())
    }

    /// Listener settings as server options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the config is invalid.
    pub fn server_options(&self) -> Result<ServerOptions, ConfigError> {
        self.validate()?;

        let bind_address =
            IpAddr::from_str(&self.server.bind_address).map_err(|e| ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid bind address: {}", e),
            })?;

        Ok(ServerOptions {
            port: self.server.port,
            bind_address,
            keep_alive: Duration::from_secs(self.server.keep_alive_secs),
            stale_close_delay: Duration::from_millis(self.server.stale_close_delay_ms),
        })
    }
}
