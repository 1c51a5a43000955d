use crate::custom_command::{CustomCommand, CustomCommandHandler};
use crate::error::CustomCommandError;

use protocol::custom_command::{
    CustomCommandArg, CustomCommandRegisterPayload, CustomCommandUnregisterPayload,
    ResponseViewType,
};

use std::collections::HashSet;

struct RegisteredCommand {
    id: u64,
    command: String,
    title: Option<String>,
    description: Option<String>,
    args: Option<Vec<CustomCommandArg>>,
    response_view_type: Option<ResponseViewType>,
    handler: CustomCommandHandler,
}

impl RegisteredCommand {
    fn register_payload(&self) -> CustomCommandRegisterPayload {
        CustomCommandRegisterPayload {
            id: self.id,
            command: self.command.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            args: self.args.clone(),
            response_view_type: self.response_view_type,
        }
    }

    fn unregister_payload(&self) -> CustomCommandUnregisterPayload {
        CustomCommandUnregisterPayload {
            id: self.id,
            command: self.command.clone(),
        }
    }
}

/// Per-client table of custom commands. Pure bookkeeping: the caller sends
/// the returned payloads.
pub(crate) struct CustomCommandRegistry {
    commands: Vec<RegisteredCommand>,
    next_id: u64,
}

impl Default for CustomCommandRegistry {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            next_id: 1,
        }
    }
}

/// Outcome of a registration: stale entries evicted, then the new entry.
pub(crate) struct Registration {
    pub(crate) evicted: Vec<CustomCommandUnregisterPayload>,
    pub(crate) registered: CustomCommandRegisterPayload,
}

impl CustomCommandRegistry {
    /// Installs `command`, evicting any entry with the same name.
    ///
    /// The command is validated in full before anything is evicted, so a
    /// rejected registration leaves the table untouched.
    pub(crate) fn register(
        &mut self,
        command: CustomCommand,
    ) -> Result<Registration, CustomCommandError> {
        if command.command.trim().is_empty() {
            return Err(CustomCommandError::missing_command());
        }

        let Some(handler) = command.handler else {
            return Err(CustomCommandError::missing_handler(&command.command));
        };

        if let Some(args) = &command.args {
            let mut names = HashSet::new();
            for arg in args {
                if arg.name.is_empty() {
                    return Err(CustomCommandError::arg_missing_name(&command.command));
                }
                if !names.insert(arg.name.as_str()) {
                    return Err(CustomCommandError::duplicate_arg(&command.command, &arg.name));
                }
            }
        }

        let mut evicted = Vec::new();
        self.commands.retain(|existing| {
            if existing.command == command.command {
                evicted.push(existing.unregister_payload());
                false
            } else {
                true
            }
        });

        let entry = RegisteredCommand {
            id: self.next_id,
            command: command.command,
            title: command.title,
            description: command.description,
            args: command.args,
            response_view_type: command.response_view_type,
            handler,
        };
        self.next_id += 1;

        let registered = entry.register_payload();
        self.commands.push(entry);

        Ok(Registration {
            evicted,
            registered,
        })
    }

    pub(crate) fn unregister(&mut self, id: u64) -> Option<CustomCommandUnregisterPayload> {
        let index = self.commands.iter().position(|entry| entry.id == id)?;
        Some(self.commands.remove(index).unregister_payload())
    }

    /// Handlers registered under `command`, in registration order.
    pub(crate) fn handlers_for(&self, command: &str) -> Vec<(String, CustomCommandHandler)> {
        self.commands
            .iter()
            .filter(|entry| entry.command == command)
            .map(|entry| (entry.command.clone(), entry.handler.clone()))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }
}
