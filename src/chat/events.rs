use crate::session::{ChatPhase, MessageRole};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Side effects a front-end reacts to: scrolling, spinners, result panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEvent {
    SessionStarted {
        session_id: String,
    },
    SessionLoaded {
        session_id: String,
    },
    SessionDeleted {
        session_id: String,
        was_current: bool,
    },
    /// A message landed in a session log; front-ends scroll to the bottom.
    MessageAppended {
        session_id: String,
        message_id: String,
        role: MessageRole,
    },
    PhaseChanged {
        from: ChatPhase,
        to: ChatPhase,
    },
    MatchesUpdated {
        count: usize,
    },
    LoadingChanged {
        loading: bool,
    },
    SearchStarted {
        query: String,
    },
    SearchFinished,
    EvaluationSaved {
        session_id: String,
        evaluations_count: u64,
    },
    EvaluationSaveFailed {
        session_id: String,
        error: String,
    },
}

pub type EventSender = broadcast::Sender<ChatEvent>;
pub type EventReceiver = broadcast::Receiver<ChatEvent>;

/// Create a broadcast event bus with the given capacity.
pub fn event_bus(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Publish without caring whether anyone is listening.
pub(crate) fn emit(tx: &EventSender, event: ChatEvent) {
    if tx.send(event).is_err() {
        tracing::trace!("chat event dropped: no subscribers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_creation() {
        let (tx, _rx) = event_bus(16);
        assert_eq!(tx.receiver_count(), 1);
    }

    #[tokio::test]
    async fn event_bus_send_receive() {
        let (tx, mut rx) = event_bus(16);

        emit(
            &tx,
            ChatEvent::PhaseChanged {
                from: ChatPhase::Intro,
                to: ChatPhase::Gathering,
            },
        );

        match rx.recv().await.unwrap() {
            ChatEvent::PhaseChanged { from, to } => {
                assert_eq!(from, ChatPhase::Intro);
                assert_eq!(to, ChatPhase::Gathering);
            }
            other => panic!("expected PhaseChanged event, got {other:?}"),
        }
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let (tx, rx) = event_bus(4);
        drop(rx);
        emit(&tx, ChatEvent::SearchFinished);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_value(ChatEvent::MatchesUpdated { count: 3 }).unwrap();
        assert_eq!(json["kind"], "matches_updated");
        assert_eq!(json["count"], 3);
    }
}
