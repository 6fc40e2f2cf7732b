//! `/commands` understood inside the interactive chat.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    New,
    Sessions,
    Load { id: Option<String> },
    Delete { id: Option<String> },
    Rename { name: Option<String> },
    Matches,
    Help,
    Quit,
}

pub const CHAT_HELP: &str = "/new           -- Start a new session\n\
                             /sessions      -- List sessions\n\
                             /load <id>     -- Switch to a saved session\n\
                             /delete <id>   -- Delete a session\n\
                             /rename <name> -- Rename the current session\n\
                             /matches       -- Show the current matches\n\
                             /help          -- Show this help message\n\
                             /quit          -- Leave the chat";

/// `None` for ordinary chat text and unknown commands.
pub fn parse_chat_command(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next()?.to_lowercase();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    match cmd.as_str() {
        "/new" | "/reset" => Some(ChatCommand::New),
        "/sessions" | "/ls" => Some(ChatCommand::Sessions),
        "/load" | "/open" => Some(ChatCommand::Load { id: arg }),
        "/delete" | "/rm" => Some(ChatCommand::Delete { id: arg }),
        "/rename" | "/mv" => Some(ChatCommand::Rename { name: arg }),
        "/matches" => Some(ChatCommand::Matches),
        "/help" | "/?" => Some(ChatCommand::Help),
        "/quit" | "/exit" => Some(ChatCommand::Quit),
        _ => None,
    }
}
