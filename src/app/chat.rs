use crate::chat::{ChatController, ChatEvent};
use crate::cli::slash::CHAT_HELP;
use crate::cli::{ChatCommand, parse_chat_command};
use crate::error::{ChatError, InternHubError};
use crate::session::{AiModeState, MessageRole, SessionManager, UserType};
use crate::ui::{render, style};
use anyhow::Result;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Result of one line typed into the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineResult {
    pub flow: Flow,
    /// Text for the terminal. Assistant replies are printed by the event
    /// printer instead.
    pub output: Option<String>,
}

impl LineResult {
    fn quiet() -> Self {
        Self {
            flow: Flow::Continue,
            output: None,
        }
    }

    fn say(text: impl Into<String>) -> Self {
        Self {
            flow: Flow::Continue,
            output: Some(text.into()),
        }
    }
}

/// Interactive chat on stdin until `/quit` or end of input.
pub async fn run(
    controller: ChatController,
    user_type: UserType,
    resume: Option<&str>,
) -> Result<()> {
    let printer = spawn_event_printer(controller.sessions().clone());

    match resume {
        Some(id) => {
            let resolved = controller
                .sessions()
                .read(|state| resolve_session_id(state, id))
                .await
                .ok_or_else(|| anyhow::anyhow!("No saved {user_type} session matches {id}"))?;
            controller.sessions().load_session(&resolved).await?;
            if let Some(session) = controller
                .sessions()
                .read(|state| state.current_session().cloned())
                .await
            {
                print!("{}", render::transcript(&session));
            }
        }
        None => {
            controller.open_session(user_type).await?;
        }
    }
    println!("{}", style::dim("Type /help for commands, /quit to leave."));

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match handle_line(&controller, user_type, &line).await {
            Ok(result) => {
                if let Some(output) = result.output {
                    println!("{output}");
                }
                if result.flow == Flow::Quit {
                    break;
                }
            }
            Err(error) => eprintln!("{}", style::warn(format!("{error:#}"))),
        }
    }

    printer.abort();
    Ok(())
}

/// Dispatch one line: a `/command` or a message for the assistant.
pub async fn handle_line(
    controller: &ChatController,
    user_type: UserType,
    line: &str,
) -> Result<LineResult> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineResult::quiet());
    }

    if let Some(command) = parse_chat_command(line) {
        return handle_command(controller, user_type, command).await;
    }
    if line.starts_with('/') {
        return Ok(LineResult::say(style::warn(format!(
            "Unknown command {line}. Type /help for the list."
        ))));
    }

    match controller.send_message(line).await {
        Ok(outcome) => {
            if outcome.failed() {
                tracing::debug!(session_id = %outcome.session_id, "reply replaced by error notice");
            }
            Ok(LineResult::quiet())
        }
        Err(InternHubError::Chat(ChatError::RequestInFlight)) => Ok(LineResult::say(
            style::warn("Still waiting for the previous reply."),
        )),
        Err(error) => Err(error.into()),
    }
}

async fn handle_command(
    controller: &ChatController,
    user_type: UserType,
    command: ChatCommand,
) -> Result<LineResult> {
    let sessions = controller.sessions();
    match command {
        ChatCommand::New => {
            controller.open_session(user_type).await?;
            Ok(LineResult::say(style::success("Started a new session.")))
        }
        ChatCommand::Sessions => Ok(LineResult::say(sessions.read(session_list).await)),
        ChatCommand::Load { id: None } | ChatCommand::Delete { id: None } => {
            Ok(LineResult::say(style::warn("Usage: /load <id> or /delete <id>")))
        }
        ChatCommand::Load { id: Some(id) } => {
            let Some(resolved) = sessions.read(|s| resolve_session_id(s, &id)).await else {
                return Ok(LineResult::say(style::warn(format!("No session matches {id}."))));
            };
            sessions.load_session(&resolved).await?;
            let transcript = sessions
                .read(|s| s.current_session().map(render::transcript))
                .await
                .unwrap_or_default();
            Ok(LineResult::say(transcript.trim_end().to_string()))
        }
        ChatCommand::Delete { id: Some(id) } => {
            let Some(resolved) = sessions.read(|s| resolve_session_id(s, &id)).await else {
                return Ok(LineResult::say(style::warn(format!("No session matches {id}."))));
            };
            let was_current = sessions
                .read(|s| s.current_session_id() == Some(resolved.as_str()))
                .await;
            sessions.delete_session(&resolved).await?;
            let mut text = style::success(format!("Deleted {}.", render::short_id(&resolved)));
            if was_current {
                text.push(' ');
                text.push_str(&style::dim("Send a message or /new to start again."));
            }
            Ok(LineResult::say(text))
        }
        ChatCommand::Rename { name: None } => {
            Ok(LineResult::say(style::warn("Usage: /rename <name>")))
        }
        ChatCommand::Rename { name: Some(name) } => {
            let Some(id) = sessions
                .read(|s| s.current_session_id().map(str::to_string))
                .await
            else {
                return Ok(LineResult::say(style::warn("No session to rename.")));
            };
            sessions.rename_session(&id, &name).await?;
            Ok(LineResult::say(style::success(format!(
                "Renamed to \"{}\".",
                name.trim()
            ))))
        }
        ChatCommand::Matches => Ok(LineResult::say(
            sessions.read(|s| render::matches(s.matches())).await,
        )),
        ChatCommand::Help => Ok(LineResult::say(CHAT_HELP)),
        ChatCommand::Quit => Ok(LineResult {
            flow: Flow::Quit,
            output: None,
        }),
    }
}

fn session_list(state: &AiModeState) -> String {
    if state.sessions().is_empty() {
        return style::dim("No sessions yet.");
    }
    let current = state.current_session_id();
    state
        .sessions()
        .iter()
        .map(|session| render::session_line(session, current == Some(session.id.as_str())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accept a full id or an unambiguous prefix of one.
pub fn resolve_session_id(state: &AiModeState, id: &str) -> Option<String> {
    if let Some(session) = state.session(id) {
        return Some(session.id.clone());
    }
    let mut candidates = state.sessions().iter().filter(|s| s.id.starts_with(id));
    let first = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }
    Some(first.id.clone())
}

fn spawn_event_printer(sessions: SessionManager) -> JoinHandle<()> {
    let mut rx = sessions.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = describe_event(&sessions, event).await {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn describe_event(sessions: &SessionManager, event: ChatEvent) -> Option<String> {
    match event {
        ChatEvent::MessageAppended {
            session_id,
            message_id,
            role: MessageRole::Assistant,
        } => {
            sessions
                .read(|state| {
                    let message = state
                        .session(&session_id)?
                        .messages
                        .iter()
                        .find(|m| m.id == message_id)?;
                    let rendered = render::message(message);
                    if state.current_session_id() == Some(session_id.as_str()) {
                        Some(rendered)
                    } else {
                        Some(format!(
                            "{} {rendered}",
                            style::dim(format!("[{}]", render::short_id(&session_id)))
                        ))
                    }
                })
                .await
        }
        ChatEvent::SearchStarted { .. } => Some(style::dim("Searching for candidates…")),
        ChatEvent::MatchesUpdated { count } if count > 0 => {
            Some(sessions.read(|state| render::matches(state.matches())).await)
        }
        ChatEvent::EvaluationSaved {
            evaluations_count, ..
        } => Some(style::dim(format!(
            "Saved {evaluations_count} evaluations to your history."
        ))),
        ChatEvent::EvaluationSaveFailed { error, .. } => Some(style::warn(format!(
            "Could not save evaluations: {error}"
        ))),
        _ => None,
    }
}
