pub mod controller;
pub mod events;
pub mod trigger;

pub use controller::{ChatController, SendOutcome, spawn_evaluation_save};
pub use events::{ChatEvent, EventReceiver, EventSender, event_bus};
pub use trigger::{ParsedReply, SEARCH_TRIGGER_TYPE, parse_assistant_reply};
