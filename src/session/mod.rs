pub mod manager;
pub mod state;
pub mod store;
pub mod types;

pub use manager::SessionManager;
pub use state::{Action, AiModeState, Transition};
pub use store::{SessionStore, SqliteSessionStore};
pub use types::{
    CandidateMatch, ChatPhase, Message, MessageMetadata, MessageRole, SearchCriteria, Session,
    UserType, dedup_skills,
};
