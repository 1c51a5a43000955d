mod client;
mod custom_command;
mod options;
