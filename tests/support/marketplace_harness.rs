#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use internhub::api::HttpMarketplaceClient;
use internhub::chat::ChatController;
use internhub::config::{ApiConfig, ChatConfig};
use internhub::session::{SessionManager, SessionStore, SqliteSessionStore, UserType};

pub const AI_MODE: &str = "/api/assistant/ai-mode";
pub const EVALUATIONS: &str = "/api/candidates/evaluations";

pub struct Harness {
    pub server: MockServer,
    pub controller: ChatController,
    pub store: Arc<SqliteSessionStore>,
}

impl Harness {
    pub async fn start(user_type: UserType) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(SqliteSessionStore::in_memory().await.unwrap());
        let controller = controller_for(&server, store.clone(), user_type);
        Self {
            server,
            controller,
            store,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        self.controller.sessions()
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.sessions()
            .read(|s| s.current_session_id().map(str::to_string))
            .await
    }

    pub async fn reply_with(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path(AI_MODE))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn accept_evaluations(&self) {
        Mock::given(method("POST"))
            .and(path(EVALUATIONS))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "evaluationsCount": 1})),
            )
            .mount(&self.server)
            .await;
    }

    /// JSON bodies the server received on `endpoint`, in arrival order.
    pub async fn bodies_for(&self, endpoint: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == endpoint)
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    pub async fn stored_message_count(&self, session_id: &str) -> usize {
        self.store.count_messages(session_id).await.unwrap()
    }
}

pub fn fast_chat_config() -> ChatConfig {
    ChatConfig {
        follow_up_delay_ms: 0,
        searching_indicator_ms: 50,
        ..ChatConfig::default()
    }
}

pub fn controller_for(
    server: &MockServer,
    store: Arc<SqliteSessionStore>,
    user_type: UserType,
) -> ChatController {
    controller_at(&server.uri(), store, user_type)
}

pub fn controller_at(
    base_url: &str,
    store: Arc<SqliteSessionStore>,
    user_type: UserType,
) -> ChatController {
    let api = HttpMarketplaceClient::new(&ApiConfig {
        base_url: base_url.to_string(),
        auth_token: Some("test-token".into()),
        timeout_secs: 5,
        connect_timeout_secs: 5,
    })
    .unwrap();
    let sessions = SessionManager::new(store, fast_chat_config(), user_type);
    ChatController::new(Arc::new(api), sessions)
}

pub fn react_match() -> Value {
    json!({
        "id": "s1",
        "name": "Ada Lovelace",
        "matchPercentage": 92,
        "skills": ["React"],
        "reasons": ["Strong portfolio"]
    })
}
