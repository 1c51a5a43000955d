use inspector::error::InspectorError;
use inspector::logger::initialize as LoggerInitialize;
use inspector::serve;
use inspector::settings::{self, PORT_ENV};

use server_core::{InspectorConfig, Server};

use std::fs::create_dir_all;

use log::{info, warn};

#[tokio::main]
async fn main() -> Result<(), InspectorError> {
    let dotenv = dotenvy::dotenv();

    let config_dir = settings::config_dir()?;
    let log_dir = settings::log_dir()?;
    create_dir_all(&log_dir).map_err(|e| {
        InspectorError::inspector(format!("Failed to create log directory: {e}"))
    })?;

    let config = InspectorConfig::load_or_create(&config_dir)?;

    // Initialize logger FIRST
    LoggerInitialize(&settings::log_file(&config, log_dir), config.log_level())?;

    info!("Inspector starting");
    info!("Config directory: {}", config_dir.display());
    if let Err(e) = dotenv
        && !e.not_found()
    {
        warn!("Ignoring unreadable .env file: {e}");
    }

    let mut options = config.server_options()?;
    options.port = settings::resolve_port(options.port, std::env::var(PORT_ENV).ok().as_deref())?;

    let server = Server::new(options);
    serve(&server, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
        }
    })
    .await
}
