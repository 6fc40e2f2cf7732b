use super::events::{ChatEvent, EventSender, emit};
use super::trigger::parse_assistant_reply;
use crate::api::client::AI_MODE_PATH;
use crate::api::scrub::sanitize_api_error;
use crate::api::{
    AiModeRequest, AiModeResponse, EvaluationCandidate, EvaluationReceipt, EvaluationRequest,
    HistoryEntry, MarketplaceApi,
};
use crate::error::{ApiError, ChatError, Result, SessionError};
use crate::session::{
    CandidateMatch, ChatPhase, Message, MessageMetadata, MessageRole, SearchCriteria,
    SessionManager, UserType, dedup_skills,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub type EvaluationTask = JoinHandle<std::result::Result<EvaluationReceipt, ApiError>>;

/// What one [`ChatController::send_message`] call did.
///
/// Background work it started is handed back so callers can await it or
/// simply drop the handles and let it run.
#[derive(Debug)]
pub struct SendOutcome {
    /// Session the exchange was recorded in.
    pub session_id: String,
    /// The assistant message appended for this reply, if any.
    pub reply: Option<Message>,
    /// Set when the assistant endpoint failed; the generic error text was
    /// appended instead of a reply.
    pub error: Option<ApiError>,
    pub criteria: Option<SearchCriteria>,
    pub match_count: usize,
    pub evaluation: Option<EvaluationTask>,
    pub follow_up: Option<JoinHandle<()>>,
    pub search_indicator: Option<JoinHandle<()>>,
}

impl SendOutcome {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            reply: None,
            error: None,
            criteria: None,
            match_count: 0,
            evaluation: None,
            follow_up: None,
            search_indicator: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Drives the conversation with the assistant endpoint on top of a
/// [`SessionManager`].
#[derive(Clone)]
pub struct ChatController {
    api: Arc<dyn MarketplaceApi>,
    sessions: SessionManager,
}

impl ChatController {
    pub fn new(api: Arc<dyn MarketplaceApi>, sessions: SessionManager) -> Self {
        Self { api, sessions }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Start a fresh session and greet it.
    pub async fn open_session(&self, user_type: UserType) -> Result<String> {
        let session = self.sessions.start_new_session(user_type).await?;
        self.sessions.send_welcome_message(user_type).await?;
        Ok(session.id)
    }

    /// Send one user message and fold the assistant's answer into state.
    ///
    /// Assistant failures do not surface as `Err`: the generic error text is
    /// appended to the session and the outcome is flagged instead.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage.into());
        }

        self.sessions.begin_request().await?;
        let outcome = self.exchange(text).await;
        self.sessions.end_request().await;
        outcome
    }

    async fn exchange(&self, text: &str) -> Result<SendOutcome> {
        let (session_id, user_message) = self
            .sessions
            .add_message(Message::new(MessageRole::User, text))
            .await?
            .ok_or(SessionError::NoCurrentSession)?;

        // The originating session is current here, so its search query is
        // captured now rather than read back after the reply.
        let (request, prior_query) = self
            .sessions
            .read(|state| {
                let session = state.session(&session_id);
                let request = AiModeRequest {
                    message: text.to_string(),
                    conversation_history: session
                        .map(|s| {
                            s.messages
                                .iter()
                                .filter(|m| m.id != user_message.id)
                                .map(HistoryEntry::from)
                                .collect()
                        })
                        .unwrap_or_default(),
                    phase: state.phase(),
                    user_type: session.map_or(state.user_type(), |s| s.user_type),
                };
                (request, state.last_search_query().map(str::to_string))
            })
            .await;

        let mut outcome = SendOutcome::new(session_id.clone());

        let response = match self.request_reply(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(session_id = %session_id, "assistant request failed: {error}");
                let notice = Message::new(
                    MessageRole::Assistant,
                    self.sessions.chat_config().error_message.clone(),
                );
                self.sessions.append_to_session(&session_id, notice).await?;
                outcome.error = Some(error);
                return Ok(outcome);
            }
        };

        let parsed = parse_assistant_reply(response.reply.as_deref().unwrap_or_default());
        let metadata = MessageMetadata::from_parts(response.kind.clone(), response.data.clone());

        if !parsed.text.is_empty() || metadata.is_some() {
            let reply = Message::new(MessageRole::Assistant, parsed.text).with_metadata(metadata);
            if self
                .sessions
                .append_to_session(&session_id, reply.clone())
                .await?
            {
                outcome.reply = Some(reply);
            } else {
                tracing::debug!(session_id = %session_id, "session removed before reply arrived");
            }
        }

        let still_current = self.is_current(&session_id).await;
        if !still_current {
            tracing::info!(
                session_id = %session_id,
                "reply arrived after switching sessions; leaving current view untouched"
            );
        }

        let search_query = match &parsed.extracted {
            Some(_) => text.to_string(),
            None => prior_query.unwrap_or_else(|| text.to_string()),
        };

        if let Some(criteria) = parsed.extracted {
            if still_current {
                outcome.search_indicator = Some(self.start_search_indicator(text).await);
            }
            tracing::info!(
                session_id = %session_id,
                skills = ?criteria.skills,
                "assistant is ready to search"
            );
            outcome.criteria = Some(criteria);
        }

        if let Some(phase) = response.parsed_phase() {
            self.sessions.set_session_phase(&session_id, phase).await?;
        }

        if let Some(matches) = response.non_empty_matches() {
            outcome.match_count = matches.len();
            tracing::info!(session_id = %session_id, matches = matches.len(), "received matches");

            self.sessions
                .set_session_phase(&session_id, ChatPhase::Results)
                .await?;
            if still_current {
                self.sessions.set_student_matches(matches.clone()).await?;
                self.sessions.finish_search(None).await;
            }

            let evaluation = self
                .evaluation_request(&session_id, search_query, &matches)
                .await;
            outcome.evaluation = Some(spawn_evaluation_save(
                Arc::clone(&self.api),
                self.sessions.event_sender().clone(),
                evaluation,
            ));
            outcome.follow_up = Some(self.schedule_follow_up(&session_id, matches.len()));
        }

        Ok(outcome)
    }

    /// Call the assistant and turn a logical `error` field into an error.
    async fn request_reply(
        &self,
        request: &AiModeRequest,
    ) -> std::result::Result<AiModeResponse, ApiError> {
        let response = self.api.ai_mode(request).await?;
        match response.error_message() {
            Some(message) => Err(ApiError::Server {
                endpoint: format!("/{AI_MODE_PATH}"),
                message: sanitize_api_error(&message),
            }),
            None => Ok(response),
        }
    }

    async fn is_current(&self, session_id: &str) -> bool {
        self.sessions
            .read(|state| state.current_session_id() == Some(session_id))
            .await
    }

    async fn start_search_indicator(&self, query: &str) -> JoinHandle<()> {
        self.sessions
            .set_last_search_query(Some(query.to_string()))
            .await;
        let generation = self.sessions.start_search().await;
        emit(
            self.sessions.event_sender(),
            ChatEvent::SearchStarted {
                query: query.to_string(),
            },
        );

        let sessions = self.sessions.clone();
        let hold = Duration::from_millis(self.sessions.chat_config().searching_indicator_ms);
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            sessions.finish_search(Some(generation)).await;
        })
    }

    async fn evaluation_request(
        &self,
        session_id: &str,
        search_query: String,
        matches: &[CandidateMatch],
    ) -> EvaluationRequest {
        let session_name = self
            .sessions
            .read(|state| {
                state
                    .session(session_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default()
            })
            .await;

        EvaluationRequest {
            session_id: session_id.to_string(),
            session_name,
            search_query,
            required_skills: dedup_skills(matches),
            candidates: matches.iter().map(EvaluationCandidate::from).collect(),
        }
    }

    fn schedule_follow_up(&self, session_id: &str, count: usize) -> JoinHandle<()> {
        let sessions = self.sessions.clone();
        let session_id = session_id.to_string();
        let delay = Duration::from_millis(self.sessions.chat_config().follow_up_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let message = Message::new(MessageRole::Assistant, follow_up_text(count));
            match sessions.append_to_session(&session_id, message).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(session_id = %session_id, "follow-up skipped: session gone");
                }
                Err(error) => {
                    tracing::warn!(session_id = %session_id, "follow-up not saved: {error:#}");
                }
            }
        })
    }
}

/// Persist evaluations in the background. The result is logged and
/// published; it never reaches the transcript.
pub fn spawn_evaluation_save(
    api: Arc<dyn MarketplaceApi>,
    events: EventSender,
    request: EvaluationRequest,
) -> EvaluationTask {
    tokio::spawn(async move {
        let result = api.save_evaluations(&request).await;
        match &result {
            Ok(receipt) => {
                tracing::info!(
                    session_id = %request.session_id,
                    evaluations = receipt.evaluations_count,
                    "saved candidate evaluations"
                );
                emit(
                    &events,
                    ChatEvent::EvaluationSaved {
                        session_id: request.session_id.clone(),
                        evaluations_count: receipt.evaluations_count,
                    },
                );
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %request.session_id,
                    "failed to save candidate evaluations: {error}"
                );
                emit(
                    &events,
                    ChatEvent::EvaluationSaveFailed {
                        session_id: request.session_id.clone(),
                        error: error.to_string(),
                    },
                );
            }
        }
        result
    })
}

fn follow_up_text(count: usize) -> String {
    if count == 1 {
        "I found 1 matching candidate. Take a look at the results and let me know if you'd \
         like to refine the search."
            .to_string()
    } else {
        format!(
            "I found {count} matching candidates. Take a look at the results and let me know if \
             you'd like to refine the search."
        )
    }
}
