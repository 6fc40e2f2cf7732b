use super::state::{Action, AiModeState, Transition};
use super::store::SessionStore;
use super::types::{CandidateMatch, ChatPhase, Message, Session, UserType};
use crate::chat::events::{ChatEvent, EventReceiver, EventSender, emit, event_bus};
use crate::config::ChatConfig;
use crate::error::ChatError;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to the chat state plus the store that keeps it durable.
///
/// State changes go through [`AiModeState::dispatch`] and are persisted
/// before the write lock is released, so the store sees changes in the same
/// order as memory. A failed write restores the previous state. Events are
/// published once the lock is gone.
#[derive(Clone)]
pub struct SessionManager {
    state: Arc<RwLock<AiModeState>>,
    store: Arc<dyn SessionStore>,
    chat: Arc<ChatConfig>,
    events: EventSender,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, chat: ChatConfig, user_type: UserType) -> Self {
        let (events, _rx) = event_bus(chat.event_capacity.max(1));
        Self {
            state: Arc::new(RwLock::new(AiModeState::new(user_type))),
            store,
            chat: Arc::new(chat),
            events,
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> &EventSender {
        &self.events
    }

    pub fn chat_config(&self) -> &ChatConfig {
        &self.chat
    }

    /// Persistence backing this manager.
    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Run a read-only closure against the current state.
    pub async fn read<R>(&self, f: impl FnOnce(&AiModeState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Load saved sessions (optionally only one audience) into memory.
    pub async fn bootstrap(&self, user_type: Option<UserType>) -> Result<usize> {
        let sessions = self
            .store
            .list_sessions(user_type)
            .await
            .context("load saved sessions")?;
        let transition = self.apply(Action::RestoreSessions(sessions)).await?;
        Ok(match transition {
            Transition::SessionsRestored { count } => count,
            _ => 0,
        })
    }

    pub async fn start_new_session(&self, user_type: UserType) -> Result<Session> {
        match self.apply(Action::StartNewSession { user_type }).await? {
            Transition::SessionStarted { session } => Ok(session),
            other => anyhow::bail!("unexpected transition starting a session: {other:?}"),
        }
    }

    /// Make `id` current. Unknown ids leave everything untouched.
    pub async fn load_session(&self, id: &str) -> Result<bool> {
        let transition = self
            .apply(Action::LoadSession { id: id.to_string() })
            .await?;
        Ok(matches!(transition, Transition::SessionLoaded { .. }))
    }

    pub async fn delete_session(&self, id: &str) -> Result<bool> {
        let transition = self
            .apply(Action::DeleteSession { id: id.to_string() })
            .await?;
        if matches!(transition, Transition::SessionDeleted { .. }) {
            return Ok(true);
        }
        // Not loaded in memory; it may still exist on disk.
        self.store.delete_session(id).await
    }

    /// Append to the current session, starting one when none is current.
    pub async fn add_message(&self, message: Message) -> Result<Option<(String, Message)>> {
        match self.apply(Action::AddMessage { message }).await? {
            Transition::MessageAppended {
                session_id,
                message,
                ..
            } => Ok(Some((session_id, message))),
            _ => Ok(None),
        }
    }

    /// Append to a specific session. Returns `false` when it no longer exists.
    pub async fn append_to_session(&self, session_id: &str, message: Message) -> Result<bool> {
        let transition = self
            .apply(Action::AppendToSession {
                session_id: session_id.to_string(),
                message,
            })
            .await?;
        Ok(matches!(transition, Transition::MessageAppended { .. }))
    }

    /// Greet the current session once; later calls are no-ops.
    pub async fn send_welcome_message(&self, user_type: UserType) -> Result<bool> {
        let text = self.chat.welcome_for(user_type).to_string();
        let transition = self
            .apply(Action::SendWelcomeMessage { user_type, text })
            .await?;
        Ok(matches!(transition, Transition::WelcomeSent { .. }))
    }

    pub async fn set_chat_phase(&self, phase: ChatPhase) -> Result<()> {
        self.apply(Action::SetChatPhase(phase)).await?;
        Ok(())
    }

    /// Record the phase the assistant reported for `session_id`. The live
    /// phase only follows when that session is current.
    pub async fn set_session_phase(&self, session_id: &str, phase: ChatPhase) -> Result<()> {
        self.apply(Action::SetSessionPhase {
            session_id: session_id.to_string(),
            phase,
        })
        .await?;
        Ok(())
    }

    pub async fn set_student_matches(&self, matches: Vec<CandidateMatch>) -> Result<()> {
        self.apply(Action::SetStudentMatches(matches)).await?;
        Ok(())
    }

    pub async fn rename_session(&self, id: &str, name: &str) -> Result<bool> {
        let transition = self
            .apply(Action::RenameSession {
                id: id.to_string(),
                name: name.to_string(),
            })
            .await?;
        Ok(matches!(transition, Transition::SessionRenamed { .. }))
    }

    /// Show the searching indicator. The returned generation identifies this
    /// particular search for [`SessionManager::finish_search`].
    pub(crate) async fn start_search(&self) -> u64 {
        let mut state = self.state.write().await;
        state.dispatch(Action::SetSearching(true));
        state.search_generation()
    }

    /// Clear the indicator. With `Some(generation)` it is only cleared if no
    /// newer search started since.
    pub(crate) async fn finish_search(&self, generation: Option<u64>) {
        let cleared = {
            let mut state = self.state.write().await;
            let stale = generation.is_some_and(|g| g != state.search_generation());
            if stale || !state.is_searching() {
                false
            } else {
                state.dispatch(Action::SetSearching(false));
                true
            }
        };
        if cleared {
            emit(&self.events, ChatEvent::SearchFinished);
        }
    }

    pub(crate) async fn set_last_search_query(&self, query: Option<String>) {
        self.state
            .write()
            .await
            .dispatch(Action::SetLastSearchQuery(query));
    }

    /// Claim the single in-flight request slot.
    pub(crate) async fn begin_request(&self) -> std::result::Result<(), ChatError> {
        {
            let mut state = self.state.write().await;
            if state.is_loading() {
                return Err(ChatError::RequestInFlight);
            }
            state.dispatch(Action::SetLoading(true));
        }
        emit(&self.events, ChatEvent::LoadingChanged { loading: true });
        Ok(())
    }

    pub(crate) async fn end_request(&self) {
        self.state.write().await.dispatch(Action::SetLoading(false));
        emit(&self.events, ChatEvent::LoadingChanged { loading: false });
    }

    async fn apply(&self, action: Action) -> Result<Transition> {
        let mut state = self.state.write().await;
        let before = state.clone();
        let transition = state.dispatch(action);
        if let Err(error) = self.persist(&state, &transition).await {
            tracing::warn!("session change not saved, reverting: {error:#}");
            *state = before;
            return Err(error);
        }
        drop(state);
        self.publish(&transition);
        Ok(transition)
    }

    async fn upsert_header(&self, state: &AiModeState, id: &str) -> Result<()> {
        if let Some(session) = state.session(id) {
            let header = Session {
                messages: Vec::new(),
                ..session.clone()
            };
            self.store.upsert_session(&header).await?;
        }
        Ok(())
    }

    async fn persist(&self, state: &AiModeState, transition: &Transition) -> Result<()> {
        match transition {
            Transition::SessionStarted { session } => {
                self.store.upsert_session(session).await?;
            }
            Transition::SessionDeleted { session_id, .. } => {
                self.store.delete_session(session_id).await?;
            }
            Transition::MessageAppended {
                session_id,
                message,
                renamed_to,
                started,
            } => {
                if let Some(session) = started {
                    self.store.upsert_session(session).await?;
                }
                self.store.append_message(session_id, message).await?;
                if renamed_to.is_some() {
                    self.upsert_header(state, session_id).await?;
                }
            }
            Transition::WelcomeSent {
                session_id,
                message,
                started,
            } => {
                if let Some(session) = started {
                    self.store.upsert_session(session).await?;
                }
                self.store.append_message(session_id, message).await?;
                self.upsert_header(state, session_id).await?;
            }
            Transition::PhaseChanged {
                session_id: Some(session_id),
                ..
            }
            | Transition::SessionPhaseSaved { session_id, .. }
            | Transition::SessionRenamed { session_id, .. } => {
                self.upsert_header(state, session_id).await?;
            }
            Transition::Unchanged
            | Transition::SessionLoaded { .. }
            | Transition::PhaseChanged {
                session_id: None, ..
            }
            | Transition::MatchesReplaced { .. }
            | Transition::SessionsRestored { .. }
            | Transition::FlagsChanged => {}
        }
        Ok(())
    }

    fn publish(&self, transition: &Transition) {
        match transition {
            Transition::SessionStarted { session } => emit(
                &self.events,
                ChatEvent::SessionStarted {
                    session_id: session.id.clone(),
                },
            ),
            Transition::SessionLoaded { session_id } => emit(
                &self.events,
                ChatEvent::SessionLoaded {
                    session_id: session_id.clone(),
                },
            ),
            Transition::SessionDeleted {
                session_id,
                was_current,
            } => emit(
                &self.events,
                ChatEvent::SessionDeleted {
                    session_id: session_id.clone(),
                    was_current: *was_current,
                },
            ),
            Transition::MessageAppended {
                session_id,
                message,
                started,
                ..
            }
            | Transition::WelcomeSent {
                session_id,
                message,
                started,
            } => {
                if let Some(session) = started {
                    emit(
                        &self.events,
                        ChatEvent::SessionStarted {
                            session_id: session.id.clone(),
                        },
                    );
                }
                emit(
                    &self.events,
                    ChatEvent::MessageAppended {
                        session_id: session_id.clone(),
                        message_id: message.id.clone(),
                        role: message.role,
                    },
                );
            }
            Transition::PhaseChanged { from, to, .. } => {
                tracing::debug!(from = %from, to = %to, "chat phase changed");
                emit(
                    &self.events,
                    ChatEvent::PhaseChanged {
                        from: *from,
                        to: *to,
                    },
                );
            }
            Transition::MatchesReplaced { count } => {
                emit(&self.events, ChatEvent::MatchesUpdated { count: *count });
            }
            Transition::SessionPhaseSaved { session_id, phase } => {
                tracing::debug!(
                    session_id = %session_id,
                    phase = %phase,
                    "phase saved for background session"
                );
            }
            Transition::Unchanged
            | Transition::SessionRenamed { .. }
            | Transition::SessionsRestored { .. }
            | Transition::FlagsChanged => {}
        }
    }
}
