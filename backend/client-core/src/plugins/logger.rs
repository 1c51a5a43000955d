use crate::client::{Client, WeakClient};
use crate::plugin::{Capability, Plugin};

use protocol::payloads::LogLevel;
use protocol::{CommandType, Payload};

/// `log` messages at debug, warn and error level.
#[derive(Debug)]
pub struct Logger {
    client: WeakClient,
}

impl Logger {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.downgrade(),
        }
    }

    pub fn log(&self, message: impl Into<Payload>) {
        self.emit(LogLevel::Debug, message.into(), None, false);
    }

    pub fn log_important(&self, message: impl Into<Payload>) {
        self.emit(LogLevel::Debug, message.into(), None, true);
    }

    pub fn debug(&self, message: impl Into<Payload>, important: bool) {
        self.emit(LogLevel::Debug, message.into(), None, important);
    }

    pub fn warn(&self, message: impl Into<Payload>) {
        self.emit(LogLevel::Warn, message.into(), None, true);
    }

    pub fn error(&self, message: impl Into<Payload>, stack: Option<Payload>) {
        self.emit(LogLevel::Error, message.into(), stack, true);
    }

    fn emit(&self, level: LogLevel, message: Payload, stack: Option<Payload>, important: bool) {
        let level = match level {
            LogLevel::Debug => "debug",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };

        let mut fields = vec![("level", Payload::from(level)), ("message", message)];
        if let Some(stack) = stack {
            fields.push(("stack", stack));
        }

        self.client
            .send(CommandType::Log, Payload::object(fields), important);
    }
}

impl Plugin for Logger {
    fn features(&self) -> &'static [&'static str] {
        &["log", "log_important", "debug", "warn", "error"]
    }
}

impl Capability for Logger {
    const NAME: &'static str = "logger";
}
