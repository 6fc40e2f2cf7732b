#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod api;
pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod session;
pub mod ui;

pub use api::{HttpMarketplaceClient, MarketplaceApi};
pub use chat::{ChatController, ChatEvent, SendOutcome};
pub use config::Config;
pub use error::{InternHubError, Result};
pub use session::{
    AiModeState, CandidateMatch, ChatPhase, Message, MessageRole, Session, SessionManager,
    UserType,
};
