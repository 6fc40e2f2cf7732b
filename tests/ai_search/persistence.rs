use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use internhub::session::{
    ChatPhase, MessageRole, SessionManager, SessionStore, SqliteSessionStore, UserType,
};

use super::marketplace_harness::{Harness, fast_chat_config, react_match};

#[tokio::test]
async fn exchange_is_persisted_in_order() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({"reply": "Which stack?", "type": "question", "data": {"step": 1}, "phase": "gathering"}))
        .await;

    let session_id = harness
        .controller
        .open_session(UserType::Company)
        .await
        .unwrap();
    harness
        .controller
        .send_message("Need a backend intern for our payments team")
        .await
        .unwrap();

    let stored = harness.store.get_session(&session_id).await.unwrap().unwrap();
    let roles: Vec<_> = stored.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [MessageRole::Assistant, MessageRole::User, MessageRole::Assistant]
    );
    assert_eq!(stored.name, "Need a backend intern for our payments t…");
    assert_eq!(stored.phase, ChatPhase::Gathering);
    assert!(stored.welcome_sent);

    let metadata = stored.messages[2].metadata.clone().unwrap();
    assert_eq!(metadata.kind.as_deref(), Some("question"));
    assert_eq!(metadata.data.unwrap()["step"], 1);
}

#[tokio::test]
async fn matches_are_not_persisted() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({"reply": "Done", "matches": [react_match()]}))
        .await;
    harness.accept_evaluations().await;

    let outcome = harness.controller.send_message("React").await.unwrap();
    outcome.evaluation.unwrap().await.unwrap().unwrap();

    let restored = SessionManager::new(
        harness.store.clone(),
        fast_chat_config(),
        UserType::Company,
    );
    restored.bootstrap(Some(UserType::Company)).await.unwrap();
    assert!(restored.load_session(&outcome.session_id).await.unwrap());

    let (phase, matches) = restored.read(|s| (s.phase(), s.matches().len())).await;
    assert_eq!(phase, ChatPhase::Results);
    assert_eq!(matches, 0);
}

#[tokio::test]
async fn sessions_survive_reopening_the_database_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("sessions.db");

    let session_id = {
        let store = Arc::new(SqliteSessionStore::open(&db).await.unwrap());
        let manager = SessionManager::new(store, fast_chat_config(), UserType::Student);
        let session = manager.start_new_session(UserType::Student).await.unwrap();
        manager.send_welcome_message(UserType::Student).await.unwrap();
        session.id
    };

    let store = Arc::new(SqliteSessionStore::open(&db).await.unwrap());
    let manager = SessionManager::new(store, fast_chat_config(), UserType::Student);
    assert_eq!(manager.bootstrap(Some(UserType::Student)).await.unwrap(), 1);
    assert_eq!(
        manager.bootstrap(Some(UserType::Company)).await.unwrap(),
        0
    );

    manager.bootstrap(None).await.unwrap();
    assert!(manager.load_session(&session_id).await.unwrap());
    assert!(!manager.send_welcome_message(UserType::Student).await.unwrap());
    assert_eq!(manager.read(|s| s.messages().len()).await, 1);
}
