use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Name given to a session until its first user message arrives.
pub const DEFAULT_SESSION_NAME: &str = "New Chat";

const SESSION_NAME_MAX_CHARS: usize = 40;

/// Which side of the marketplace a chat belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UserType {
    Student,
    #[default]
    Company,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Coarse stage of an AI-assisted search conversation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChatPhase {
    #[default]
    Intro,
    Gathering,
    Matching,
    Results,
}

/// Structured payload echoed from the assistant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl MessageMetadata {
    /// `None` when the response carried neither a type nor data.
    pub fn from_parts(kind: Option<String>, data: Option<serde_json::Value>) -> Option<Self> {
        if kind.is_none() && data.is_none() {
            None
        } else {
            Some(Self { kind, data })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_metadata(mut self, metadata: Option<MessageMetadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_type: UserType,
    pub name: String,
    pub created_at: String,
    pub phase: ChatPhase,
    /// One-shot guard for the greeting message.
    pub welcome_sent: bool,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(user_type: UserType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_type,
            name: DEFAULT_SESSION_NAME.to_string(),
            created_at: Utc::now().to_rfc3339(),
            phase: ChatPhase::Intro,
            welcome_sent: false,
            messages: Vec::new(),
        }
    }

    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(|m| m.role == MessageRole::User)
    }
}

/// Derive a session name from the first thing the user typed.
pub fn session_name_from(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SESSION_NAME_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut name: String = trimmed.chars().take(SESSION_NAME_MAX_CHARS).collect();
    name.truncate(name.trim_end().len());
    name.push('…');
    name
}

/// Search parameters the assistant signals once it has gathered enough.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(rename = "roleType", default, skip_serializing_if = "Option::is_none")]
    pub role_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A candidate scored against search criteria. Never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMatch {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::percentage")]
    pub match_percentage: f64,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub skills: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::link"
    )]
    pub portfolio: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_text"
    )]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub reasons: Vec<String>,
}

/// Field decoders for candidate data produced by the matching backend, which
/// is loose about types: numeric ids, `null` scores, portfolio objects.
mod lenient {
    use serde::Deserialize;
    use serde::de::{Deserializer, Error};
    use serde_json::Value;

    fn scalar(value: &Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = Value::deserialize(deserializer)?;
        scalar(&value)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| D::Error::custom(format!("unusable candidate id {value}")))
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(scalar(&Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(scalar(&Value::deserialize(deserializer)?).filter(|text| !text.is_empty()))
    }

    /// `null`, strings like `"87%"` and numbers all map to a score.
    pub fn percentage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let score = match Value::deserialize(deserializer)? {
            Value::Number(number) => number.as_f64().unwrap_or_default(),
            Value::String(text) => text
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .unwrap_or_default(),
            _ => 0.0,
        };
        Ok(if score.is_finite() { score } else { 0.0 })
    }

    /// A plain URL, or an object carrying one under `url`/`link`/`href`.
    pub fn link<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let link = match &value {
            Value::Object(map) => ["url", "link", "href"]
                .iter()
                .find_map(|key| map.get(*key).and_then(scalar))
                .or_else(|| (!map.is_empty()).then(|| value.to_string())),
            other => scalar(other),
        };
        Ok(link.filter(|text| !text.is_empty()))
    }

    /// An array of scalars or one comma-separated string.
    pub fn string_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        let items = match Value::deserialize(deserializer)? {
            Value::Array(items) => items.iter().filter_map(scalar).collect(),
            Value::String(text) => text.split(',').map(|item| item.trim().to_string()).collect(),
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter(|item: &String| !item.is_empty())
            .collect())
    }
}

/// Unique skills across all matches, in first-seen order. Comparison ignores
/// case and surrounding whitespace; the first spelling wins.
pub fn dedup_skills(matches: &[CandidateMatch]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut skills = Vec::new();
    for skill in matches.iter().flat_map(|m| m.skills.iter()) {
        let trimmed = skill.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            skills.push(trimmed.to_string());
        }
    }
    skills
}
