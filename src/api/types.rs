//! Wire shapes for the marketplace endpoints. Field names follow the
//! backend's camelCase JSON.

use crate::session::{CandidateMatch, ChatPhase, Message, MessageRole, UserType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── POST /api/assistant/ai-mode ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiModeRequest {
    pub message: String,
    pub conversation_history: Vec<HistoryEntry>,
    pub phase: ChatPhase,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiModeResponse {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    /// Kept raw so an unknown phase name does not reject the whole reply.
    #[serde(default)]
    pub phase: Option<String>,
    /// Decoded entry by entry in [`AiModeResponse::non_empty_matches`] so one
    /// bad candidate cannot reject the reply.
    #[serde(default)]
    pub matches: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl AiModeResponse {
    pub fn parsed_phase(&self) -> Option<ChatPhase> {
        let raw = self.phase.as_deref()?;
        match raw.trim().parse::<ChatPhase>() {
            Ok(phase) => Some(phase),
            Err(_) => {
                tracing::warn!(phase = raw, "Ignoring unknown phase from assistant");
                None
            }
        }
    }

    /// Server-reported logical error, if any.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(text.clone()),
            Value::Object(map) => Some(
                map.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_string),
            ),
            other => Some(other.to_string()),
        }
    }

    /// Decodable matches, only when at least one survives. Entries that do
    /// not decode are logged and skipped.
    pub fn non_empty_matches(&self) -> Option<Vec<CandidateMatch>> {
        let entries = match self.matches.as_ref()? {
            Value::Array(entries) => entries,
            Value::Null => return None,
            other => {
                tracing::warn!(
                    kind = json_kind(other),
                    "Ignoring non-array matches from assistant"
                );
                return None;
            }
        };

        let matches: Vec<CandidateMatch> = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                CandidateMatch::deserialize(entry)
                    .inspect_err(|error| {
                        tracing::warn!(index, "Skipping undecodable candidate match: {error}");
                    })
                    .ok()
            })
            .collect();
        (!matches.is_empty()).then_some(matches)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── POST /api/candidates/evaluations ─────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationCandidate {
    pub id: String,
    pub match_percentage: f64,
    pub reasons: Vec<String>,
    pub skills: Vec<String>,
}

impl From<&CandidateMatch> for EvaluationCandidate {
    fn from(candidate: &CandidateMatch) -> Self {
        Self {
            id: candidate.id.clone(),
            match_percentage: candidate.match_percentage,
            reasons: candidate.reasons.clone(),
            skills: candidate.skills.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub session_id: String,
    pub session_name: String,
    pub search_query: String,
    pub required_skills: Vec<String>,
    pub candidates: Vec<EvaluationCandidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub evaluations_count: u64,
}

// ── GET /api/candidates/evaluations ──────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvaluation {
    #[serde(default, alias = "id")]
    pub candidate_id: String,
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub match_percentage: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSession {
    pub session_id: String,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, alias = "candidates")]
    pub evaluations: Vec<StoredEvaluation>,
}

/// The history endpoint answers either a bare list or `{ "sessions": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EvaluationHistoryBody {
    Wrapped { sessions: Vec<EvaluationSession> },
    Bare(Vec<EvaluationSession>),
}

impl From<EvaluationHistoryBody> for Vec<EvaluationSession> {
    fn from(body: EvaluationHistoryBody) -> Self {
        match body {
            EvaluationHistoryBody::Wrapped { sessions } | EvaluationHistoryBody::Bare(sessions) => {
                sessions
            }
        }
    }
}

// ── GET /api/candidates?search= ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CandidateListBody {
    Wrapped { candidates: Vec<CandidateProfile> },
    Bare(Vec<CandidateProfile>),
}

impl From<CandidateListBody> for Vec<CandidateProfile> {
    fn from(body: CandidateListBody) -> Self {
        match body {
            CandidateListBody::Wrapped { candidates } | CandidateListBody::Bare(candidates) => {
                candidates
            }
        }
    }
}
