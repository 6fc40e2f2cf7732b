use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use internhub::chat::ChatEvent;
use internhub::error::{ApiError, ChatError, InternHubError};
use internhub::session::{ChatPhase, MessageRole, SqliteSessionStore, UserType};

use super::marketplace_harness::{AI_MODE, EVALUATIONS, Harness, controller_at, react_match};

#[tokio::test]
async fn http_500_appends_single_generic_error_and_keeps_phase() {
    let harness = Harness::start(UserType::Company).await;
    Mock::given(method("POST"))
        .and(path(AI_MODE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reply": "What skills?",
            "phase": "gathering"
        })))
        .up_to_n_times(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path(AI_MODE))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&harness.server)
        .await;

    harness.controller.send_message("Hello").await.unwrap();
    let outcome = harness.controller.send_message("Rust").await.unwrap();

    assert!(outcome.failed());
    assert!(matches!(
        outcome.error,
        Some(ApiError::Status { status: 500, .. })
    ));

    let messages = harness.sessions().read(|s| s.messages().to_vec()).await;
    assert_eq!(messages.len(), 4);
    let errors: Vec<_> = messages
        .iter()
        .filter(|m| m.content == harness.sessions().chat_config().error_message)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].role, MessageRole::Assistant);
    assert_eq!(
        harness.sessions().read(|s| s.phase()).await,
        ChatPhase::Gathering
    );
    assert!(!harness.sessions().read(|s| s.is_loading()).await);
}

#[tokio::test]
async fn undecodable_body_is_a_failure() {
    let harness = Harness::start(UserType::Company).await;
    Mock::given(method("POST"))
        .and(path(AI_MODE))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&harness.server)
        .await;

    let outcome = harness.controller.send_message("Hello").await.unwrap();
    assert!(matches!(outcome.error, Some(ApiError::Decode { .. })));
    assert_eq!(harness.sessions().read(|s| s.messages().len()).await, 2);
}

#[tokio::test]
async fn unreachable_backend_is_a_failure_not_an_error() {
    let store = Arc::new(SqliteSessionStore::in_memory().await.unwrap());
    // Port 9 (discard) is not served in test environments.
    let controller = controller_at("http://127.0.0.1:9", store, UserType::Company);

    let outcome = controller.send_message("Hello").await.unwrap();
    assert!(matches!(outcome.error, Some(ApiError::Transport { .. })));
    assert!(!controller.sessions().read(|s| s.is_loading()).await);
    assert_eq!(controller.sessions().read(|s| s.messages().len()).await, 2);
}

#[tokio::test]
async fn server_error_field_is_reported_as_failure() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({"error": {"message": "rate limited"}}))
        .await;

    let outcome = harness.controller.send_message("Hello").await.unwrap();
    match outcome.error {
        Some(ApiError::Server { message, .. }) => assert_eq!(message, "rate limited"),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_input_never_reaches_the_network() {
    let harness = Harness::start(UserType::Company).await;

    let err = harness.controller.send_message(" \n\t ").await.unwrap_err();
    assert!(matches!(err, InternHubError::Chat(ChatError::EmptyMessage)));
    assert!(harness.bodies_for(AI_MODE).await.is_empty());
}

#[tokio::test]
async fn failed_evaluation_save_is_published_and_not_retried() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({"reply": "Found some.", "matches": [react_match()]}))
        .await;
    Mock::given(method("POST"))
        .and(path(EVALUATIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&harness.server)
        .await;
    let mut events = harness.sessions().subscribe();

    let outcome = harness.controller.send_message("Go devs").await.unwrap();
    let result = outcome.evaluation.unwrap().await.unwrap();
    assert!(matches!(result, Err(ApiError::Server { .. })));

    assert_eq!(harness.bodies_for(EVALUATIONS).await.len(), 1);
    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ChatEvent::EvaluationSaveFailed { .. }) {
            failed = true;
        }
    }
    assert!(failed);
    assert_eq!(
        harness.sessions().read(|s| s.phase()).await,
        ChatPhase::Results
    );
}
