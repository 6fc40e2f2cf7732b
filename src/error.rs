use thiserror::Error;

/// Errors surfaced by the `internhub` library API.
///
/// One variant per subsystem so callers can react to API failures separately
/// from local session problems. Internal plumbing stays on `anyhow` and lands
/// in [`InternHubError::Other`].
#[derive(Debug, Error)]
pub enum InternHubError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("api: {0}")]
    Api(#[from] ApiError),

    #[error("session: {0}")]
    Session(#[from] SessionError),

    #[error("chat: {0}")]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Load(String),

    #[error("invalid config: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} returned an undecodable body: {message}")]
    Decode { endpoint: String, message: String },

    #[error("{endpoint} reported an error: {message}")]
    Server { endpoint: String, message: String },

    #[error("invalid endpoint url: {0}")]
    Url(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session with id {0}")]
    NotFound(String),

    #[error("no current session")]
    NoCurrentSession,

    #[error("store: {0}")]
    Store(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a request is already in flight")]
    RequestInFlight,
}

pub type Result<T> = std::result::Result<T, InternHubError>;
