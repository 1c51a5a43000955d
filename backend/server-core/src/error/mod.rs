pub mod config;
pub mod server;

pub use config::ConfigError;
pub use server::ServerError;
