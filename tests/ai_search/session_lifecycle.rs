use serde_json::json;

use internhub::chat::ChatEvent;
use internhub::session::{ChatPhase, SessionStore, UserType};

use super::marketplace_harness::{Harness, react_match};

#[tokio::test]
async fn deleting_current_session_resets_view_and_store() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({"reply": "ok", "matches": [react_match()]}))
        .await;
    harness.accept_evaluations().await;

    let session_id = harness
        .controller
        .open_session(UserType::Company)
        .await
        .unwrap();
    let outcome = harness.controller.send_message("React").await.unwrap();
    outcome.evaluation.unwrap().await.unwrap().unwrap();
    outcome.follow_up.unwrap().await.unwrap();
    let mut events = harness.sessions().subscribe();

    assert!(harness.sessions().delete_session(&session_id).await.unwrap());

    assert!(harness.current_session_id().await.is_none());
    assert_eq!(
        harness.sessions().read(|s| s.phase()).await,
        ChatPhase::Intro
    );
    assert!(harness.sessions().read(|s| s.matches().is_empty()).await);
    assert!(harness.store.get_session(&session_id).await.unwrap().is_none());
    assert_eq!(harness.stored_message_count(&session_id).await, 0);
    assert_eq!(
        events.try_recv().unwrap(),
        ChatEvent::SessionDeleted {
            session_id,
            was_current: true
        }
    );
}

#[tokio::test]
async fn message_after_delete_starts_a_fresh_session() {
    let harness = Harness::start(UserType::Company).await;
    harness.reply_with(json!({"reply": "Hello again"})).await;

    let first = harness
        .controller
        .open_session(UserType::Company)
        .await
        .unwrap();
    harness.sessions().delete_session(&first).await.unwrap();

    let outcome = harness.controller.send_message("Back again").await.unwrap();
    assert_ne!(outcome.session_id, first);
    assert_eq!(harness.current_session_id().await, Some(outcome.session_id.clone()));
    assert_eq!(harness.stored_message_count(&outcome.session_id).await, 2);
}

#[tokio::test]
async fn switching_sessions_restores_each_log_and_phase() {
    let harness = Harness::start(UserType::Student).await;
    harness
        .reply_with(json!({"reply": "Tell me more", "phase": "gathering"}))
        .await;

    let first = harness
        .controller
        .open_session(UserType::Student)
        .await
        .unwrap();
    harness.controller.send_message("Design").await.unwrap();
    let second = harness
        .controller
        .open_session(UserType::Student)
        .await
        .unwrap();

    assert_eq!(
        harness.sessions().read(|s| (s.phase(), s.messages().len())).await,
        (ChatPhase::Intro, 1)
    );

    assert!(harness.sessions().load_session(&first).await.unwrap());
    assert_eq!(
        harness.sessions().read(|s| (s.phase(), s.messages().len())).await,
        (ChatPhase::Gathering, 3)
    );

    assert!(!harness.sessions().load_session("missing").await.unwrap());
    assert_eq!(harness.current_session_id().await, Some(first));
    assert_ne!(second, harness.current_session_id().await.unwrap());
}
