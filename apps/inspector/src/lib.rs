//! Headless inspector host.
//!
//! Loads settings, runs a [`Server`] and logs everything it reports until
//! shutdown is requested.

pub mod error;
pub mod logger;
pub mod monitor;
pub mod settings;

use crate::error::InspectorError;

use server_core::Server;

use std::future::Future;

use log::info;

/// Runs `server` until `shutdown` completes, then stops it.
///
/// # Errors
///
/// Returns [`InspectorError::Server`] if the server cannot start (for example
/// because its port is taken) or fails to stop.
pub async fn serve(server: &Server, shutdown: impl Future<Output = ()>) -> Result<(), InspectorError> {
    let monitor = tokio::spawn(monitor::run(server.subscribe()));

    let address = match server.start().await {
        Ok(address) => address,
        Err(e) => {
            // Give the monitor a chance to log the port event.
            tokio::task::yield_now().await;
            monitor.abort();
            return Err(e.into());
        }
    };
    info!("Inspector ready on {address}");

    shutdown.await;

    info!("Shutting down");
    let stopped = server.stop().await;
    tokio::task::yield_now().await;
    monitor.abort();
    stopped.map_err(InspectorError::from)
}
