pub mod commands;
pub mod slash;

pub use commands::{Cli, Commands, SessionCommands};
pub use slash::{ChatCommand, parse_chat_command};
