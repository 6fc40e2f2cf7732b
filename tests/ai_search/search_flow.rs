use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use internhub::chat::ChatEvent;
use internhub::session::{ChatPhase, MessageRole, UserType};

use super::marketplace_harness::{AI_MODE, EVALUATIONS, Harness, react_match};

#[tokio::test]
async fn ready_for_search_reply_is_cleaned_and_flags_searching() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({
            "reply": "Great, searching now! {\"type\":\"ready_for_search\",\"criteria\":{\"skills\":[\"React\",\"TypeScript\"],\"roleType\":\"Developer\",\"field\":\"Engineering\"}}",
            "matches": []
        }))
        .await;
    let mut events = harness.sessions().subscribe();

    let outcome = harness
        .controller
        .send_message("React developer with TypeScript experience")
        .await
        .unwrap();

    let messages = harness.sessions().read(|s| s.messages().to_vec()).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "Great, searching now!");
    assert!(messages.iter().all(|m| !m.content.contains("ready_for_search")));
    assert!(harness.sessions().read(|s| s.is_searching()).await);

    outcome.search_indicator.unwrap().await.unwrap();
    assert!(!harness.sessions().read(|s| s.is_searching()).await);

    let mut saw_search = false;
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::SearchStarted { query } = event {
            assert_eq!(query, "React developer with TypeScript experience");
            saw_search = true;
        }
    }
    assert!(saw_search);
    assert!(harness.bodies_for(EVALUATIONS).await.is_empty());
}

#[tokio::test]
async fn matches_switch_to_results_and_save_evaluations_for_current_session() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({"matches": [react_match()]}))
        .await;
    harness.accept_evaluations().await;

    let outcome = harness.controller.send_message("React intern").await.unwrap();
    let current = harness.current_session_id().await.unwrap();

    assert_eq!(harness.sessions().read(|s| s.matches().len()).await, 1);
    assert_eq!(
        harness.sessions().read(|s| s.phase()).await,
        ChatPhase::Results
    );

    let receipt = outcome.evaluation.unwrap().await.unwrap().unwrap();
    assert!(receipt.success);

    let saved = harness.bodies_for(EVALUATIONS).await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["sessionId"], current.as_str());
    assert_eq!(saved[0]["sessionName"], "React intern");
    assert_eq!(saved[0]["requiredSkills"], json!(["React"]));
    assert_eq!(saved[0]["candidates"][0]["id"], "s1");
    assert_eq!(saved[0]["candidates"][0]["matchPercentage"], 92.0);
}

#[tokio::test]
async fn matches_override_phase_field() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({
            "reply": "Still thinking",
            "phase": "gathering",
            "matches": [react_match()]
        }))
        .await;
    harness.accept_evaluations().await;

    harness.controller.send_message("anything").await.unwrap();
    assert_eq!(
        harness.sessions().read(|s| s.phase()).await,
        ChatPhase::Results
    );
}

#[tokio::test]
async fn phase_field_drives_transitions_without_matches() {
    let harness = Harness::start(UserType::Student).await;
    harness
        .reply_with(json!({"reply": "What field?", "phase": "gathering"}))
        .await;

    harness.controller.send_message("Hi").await.unwrap();
    assert_eq!(
        harness.sessions().read(|s| s.phase()).await,
        ChatPhase::Gathering
    );
}

#[tokio::test]
async fn request_carries_history_phase_user_type_and_token() {
    let harness = Harness::start(UserType::Student).await;
    Mock::given(method("POST"))
        .and(path(AI_MODE))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"userType": "student", "phase": "intro"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "Noted."})))
        .expect(2)
        .mount(&harness.server)
        .await;

    harness
        .controller
        .open_session(UserType::Student)
        .await
        .unwrap();
    harness.controller.send_message("first").await.unwrap();
    harness.controller.send_message("second").await.unwrap();

    let bodies = harness.bodies_for(AI_MODE).await;
    assert_eq!(bodies[0]["message"], "first");
    assert_eq!(bodies[0]["conversationHistory"].as_array().unwrap().len(), 1);
    assert_eq!(bodies[1]["message"], "second");
    assert_eq!(
        bodies[1]["conversationHistory"],
        json!([
            {"role": "assistant", "content": harness.sessions().chat_config().student_welcome},
            {"role": "user", "content": "first"},
            {"role": "assistant", "content": "Noted."}
        ])
    );
}

#[tokio::test]
async fn follow_up_message_reports_match_count() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({
            "reply": "Here you go.",
            "matches": [react_match(), {"id": "s2", "name": "Grace", "matchPercentage": 71, "skills": ["react", "Go"]}]
        }))
        .await;
    harness.accept_evaluations().await;

    let outcome = harness.controller.send_message("Frontend").await.unwrap();
    let saved = outcome.evaluation.unwrap().await.unwrap().unwrap();
    assert!(saved.success);
    outcome.follow_up.unwrap().await.unwrap();

    let messages = harness.sessions().read(|s| s.messages().to_vec()).await;
    let last = messages.last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert!(last.content.contains("2 matching candidates"));

    let bodies = harness.bodies_for(EVALUATIONS).await;
    assert_eq!(bodies[0]["requiredSkills"], json!(["React", "Go"]));
}

#[tokio::test]
async fn loosely_typed_match_does_not_cost_the_reply() {
    let harness = Harness::start(UserType::Company).await;
    harness
        .reply_with(json!({
            "reply": "Here are your candidates.",
            "matches": [
                {"id": 17, "name": "Ada", "matchPercentage": null, "portfolio": {"url": "https://ada.dev"}},
                {"name": "no id"},
                react_match()
            ]
        }))
        .await;
    harness.accept_evaluations().await;

    let outcome = harness.controller.send_message("React intern").await.unwrap();

    assert!(!outcome.failed());
    assert_eq!(outcome.match_count, 2);
    let last = harness
        .sessions()
        .read(|s| s.messages().last().cloned())
        .await
        .unwrap();
    assert_eq!(last.content, "Here are your candidates.");
    assert_eq!(
        harness.sessions().read(|s| s.phase()).await,
        ChatPhase::Results
    );

    outcome.evaluation.unwrap().await.unwrap().unwrap();
    let saved = harness.bodies_for(EVALUATIONS).await;
    assert_eq!(saved[0]["candidates"][0]["id"], "17");
    assert_eq!(saved[0]["candidates"][0]["matchPercentage"], 0.0);
}
