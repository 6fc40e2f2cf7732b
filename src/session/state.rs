//! In-memory state behind the AI search chat.
//!
//! Every mutation goes through [`AiModeState::dispatch`], which applies one
//! [`Action`] and reports the resulting [`Transition`]. Nothing here performs
//! I/O; persistence and side effects are driven by the returned transition.

use super::types::{
    CandidateMatch, ChatPhase, DEFAULT_SESSION_NAME, Message, MessageRole, Session, UserType,
    session_name_from,
};

#[derive(Debug, Clone)]
pub enum Action {
    StartNewSession {
        user_type: UserType,
    },
    LoadSession {
        id: String,
    },
    DeleteSession {
        id: String,
    },
    /// Append to the current session, starting one if none is current.
    AddMessage {
        message: Message,
    },
    /// Append to a specific session regardless of which one is current.
    AppendToSession {
        session_id: String,
        message: Message,
    },
    SendWelcomeMessage {
        user_type: UserType,
        text: String,
    },
    SetChatPhase(ChatPhase),
    /// Phase reported for a specific session; the live phase follows only
    /// when it is current.
    SetSessionPhase {
        session_id: String,
        phase: ChatPhase,
    },
    SetStudentMatches(Vec<CandidateMatch>),
    RenameSession {
        id: String,
        name: String,
    },
    RestoreSessions(Vec<Session>),
    SetLoading(bool),
    SetSearching(bool),
    SetLastSearchQuery(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Unchanged,
    SessionStarted {
        session: Session,
    },
    SessionLoaded {
        session_id: String,
    },
    SessionDeleted {
        session_id: String,
        was_current: bool,
    },
    MessageAppended {
        session_id: String,
        message: Message,
        /// Set when this message gave the session its name.
        renamed_to: Option<String>,
        /// Set when the session had to be created for this message.
        started: Option<Session>,
    },
    WelcomeSent {
        session_id: String,
        message: Message,
        started: Option<Session>,
    },
    PhaseChanged {
        session_id: Option<String>,
        from: ChatPhase,
        to: ChatPhase,
    },
    /// Phase stored on a session that is not current.
    SessionPhaseSaved {
        session_id: String,
        phase: ChatPhase,
    },
    MatchesReplaced {
        count: usize,
    },
    SessionRenamed {
        session_id: String,
        name: String,
    },
    SessionsRestored {
        count: usize,
    },
    FlagsChanged,
}

#[derive(Debug, Clone, Default)]
pub struct AiModeState {
    user_type: UserType,
    sessions: Vec<Session>,
    current_session_id: Option<String>,
    phase: ChatPhase,
    matches: Vec<CandidateMatch>,
    is_loading: bool,
    is_searching: bool,
    search_generation: u64,
    last_search_query: Option<String>,
}

impl AiModeState {
    pub fn new(user_type: UserType) -> Self {
        Self {
            user_type,
            ..Self::default()
        }
    }

    /// Apply one action. This is the only way state changes.
    pub fn dispatch(&mut self, action: Action) -> Transition {
        match action {
            Action::StartNewSession { user_type } => self.start_new_session(user_type),
            Action::LoadSession { id } => self.load_session(&id),
            Action::DeleteSession { id } => self.delete_session(&id),
            Action::AddMessage { message } => self.add_message(message),
            Action::AppendToSession {
                session_id,
                message,
            } => self.append_to_session(&session_id, message),
            Action::SendWelcomeMessage { user_type, text } => {
                self.send_welcome_message(user_type, text)
            }
            Action::SetChatPhase(phase) => self.set_chat_phase(phase),
            Action::SetSessionPhase { session_id, phase } => {
                self.set_session_phase(&session_id, phase)
            }
            Action::SetStudentMatches(matches) => self.set_student_matches(matches),
            Action::RenameSession { id, name } => self.rename_session(&id, name),
            Action::RestoreSessions(sessions) => self.restore_sessions(sessions),
            Action::SetLoading(loading) => {
                self.is_loading = loading;
                Transition::FlagsChanged
            }
            Action::SetSearching(searching) => {
                if searching {
                    self.search_generation += 1;
                }
                self.is_searching = searching;
                Transition::FlagsChanged
            }
            Action::SetLastSearchQuery(query) => {
                self.last_search_query = query;
                Transition::FlagsChanged
            }
        }
    }

    fn start_new_session(&mut self, user_type: UserType) -> Transition {
        let session = Session::new(user_type);
        self.user_type = user_type;
        self.current_session_id = Some(session.id.clone());
        self.phase = ChatPhase::Intro;
        self.matches.clear();
        self.is_searching = false;
        self.last_search_query = None;
        self.sessions.push(session.clone());
        Transition::SessionStarted { session }
    }

    fn load_session(&mut self, id: &str) -> Transition {
        let Some(session) = self.sessions.iter().find(|s| s.id == id) else {
            return Transition::Unchanged;
        };
        self.phase = session.phase;
        self.user_type = session.user_type;
        self.current_session_id = Some(session.id.clone());
        self.matches.clear();
        self.is_searching = false;
        self.last_search_query = None;
        Transition::SessionLoaded {
            session_id: id.to_string(),
        }
    }

    fn delete_session(&mut self, id: &str) -> Transition {
        let Some(index) = self.sessions.iter().position(|s| s.id == id) else {
            return Transition::Unchanged;
        };
        self.sessions.remove(index);

        let was_current = self.current_session_id.as_deref() == Some(id);
        if was_current {
            self.current_session_id = None;
            self.phase = ChatPhase::Intro;
            self.matches.clear();
            self.is_searching = false;
            self.last_search_query = None;
        }
        Transition::SessionDeleted {
            session_id: id.to_string(),
            was_current,
        }
    }

    fn ensure_current(&mut self) -> Option<Session> {
        if self.current_session().is_some() {
            return None;
        }
        match self.start_new_session(self.user_type) {
            Transition::SessionStarted { session } => Some(session),
            _ => None,
        }
    }

    fn add_message(&mut self, message: Message) -> Transition {
        let started = self.ensure_current();
        let Some(session_id) = self.current_session_id.clone() else {
            return Transition::Unchanged;
        };
        match self.append_to_session(&session_id, message) {
            Transition::MessageAppended {
                session_id,
                message,
                renamed_to,
                ..
            } => Transition::MessageAppended {
                session_id,
                message,
                renamed_to,
                started,
            },
            other => other,
        }
    }

    fn append_to_session(&mut self, session_id: &str, message: Message) -> Transition {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Transition::Unchanged;
        };

        let renamed_to = if message.role == MessageRole::User
            && session.name == DEFAULT_SESSION_NAME
            && !session.has_user_messages()
            && !message.content.trim().is_empty()
        {
            session.name = session_name_from(&message.content);
            Some(session.name.clone())
        } else {
            None
        };

        session.messages.push(message.clone());
        Transition::MessageAppended {
            session_id: session_id.to_string(),
            message,
            renamed_to,
            started: None,
        }
    }

    fn send_welcome_message(&mut self, user_type: UserType, text: String) -> Transition {
        let started = self.ensure_current();
        let Some(session) = self.current_session_mut() else {
            return Transition::Unchanged;
        };
        if session.welcome_sent {
            return Transition::Unchanged;
        }
        if session.messages.is_empty() {
            session.user_type = user_type;
        }
        let message = Message::new(MessageRole::Assistant, text);
        session.welcome_sent = true;
        session.messages.push(message.clone());
        Transition::WelcomeSent {
            session_id: session.id.clone(),
            message,
            started,
        }
    }

    fn set_chat_phase(&mut self, phase: ChatPhase) -> Transition {
        let from = self.phase;
        self.phase = phase;
        let session_id = self.current_session_mut().map(|session| {
            session.phase = phase;
            session.id.clone()
        });
        if from == phase {
            return Transition::Unchanged;
        }
        Transition::PhaseChanged {
            session_id,
            from,
            to: phase,
        }
    }

    fn set_session_phase(&mut self, session_id: &str, phase: ChatPhase) -> Transition {
        if self.current_session_id.as_deref() == Some(session_id) {
            return self.set_chat_phase(phase);
        }
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Transition::Unchanged;
        };
        if session.phase == phase {
            return Transition::Unchanged;
        }
        session.phase = phase;
        Transition::SessionPhaseSaved {
            session_id: session_id.to_string(),
            phase,
        }
    }

    fn set_student_matches(&mut self, matches: Vec<CandidateMatch>) -> Transition {
        self.matches = matches;
        Transition::MatchesReplaced {
            count: self.matches.len(),
        }
    }

    fn rename_session(&mut self, id: &str, name: String) -> Transition {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Transition::Unchanged;
        }
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            return Transition::Unchanged;
        };
        session.name.clone_from(&name);
        Transition::SessionRenamed {
            session_id: id.to_string(),
            name,
        }
    }

    fn restore_sessions(&mut self, sessions: Vec<Session>) -> Transition {
        let count = sessions.len();
        self.sessions = sessions;
        if let Some(current) = self.current_session_id.clone() {
            if !self.sessions.iter().any(|s| s.id == current) {
                self.current_session_id = None;
                self.phase = ChatPhase::Intro;
                self.matches.clear();
            }
        }
        Transition::SessionsRestored { count }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    pub fn current_session(&self) -> Option<&Session> {
        let id = self.current_session_id.as_deref()?;
        self.session(id)
    }

    fn current_session_mut(&mut self) -> Option<&mut Session> {
        let id = self.current_session_id.clone()?;
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Messages of the current session, empty when there is none.
    pub fn messages(&self) -> &[Message] {
        self.current_session()
            .map_or(&[][..], |session| session.messages.as_slice())
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn matches(&self) -> &[CandidateMatch] {
        &self.matches
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    pub fn last_search_query(&self) -> Option<&str> {
        self.last_search_query.as_deref()
    }

    /// Bumped every time the searching indicator is switched on.
    pub fn search_generation(&self) -> u64 {
        self.search_generation
    }
}
