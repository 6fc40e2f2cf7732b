use crate::session::UserType;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = ".internhub";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_STORE_FILE: &str = "sessions.db";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory - computed from home, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Where this config was loaded from; never written to the file.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Tracing level for the terminal front-end
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Audience used when a chat is started without an explicit user type
    #[serde(default)]
    pub default_user_type: UserType,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the marketplace backend (default: http://localhost:3000)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token forwarded on every request
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_student_welcome")]
    pub student_welcome: String,
    #[serde(default = "default_company_welcome")]
    pub company_welcome: String,
    /// Assistant text shown when the assistant endpoint fails
    #[serde(default = "default_error_message")]
    pub error_message: String,
    /// Delay before the match-count summary follows a results reply
    #[serde(default = "default_follow_up_delay_ms")]
    pub follow_up_delay_ms: u64,
    /// How long the searching indicator stays up when no matches arrive
    #[serde(default = "default_searching_indicator_ms")]
    pub searching_indicator_ms: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_student_welcome() -> String {
    "Hi! I'm your AI career assistant. Tell me what kind of internship you're looking for \
     and I'll help you find the right fit."
        .into()
}

fn default_company_welcome() -> String {
    "Hi! I'm your AI recruiting assistant. Describe the role you're hiring for and the \
     skills that matter, and I'll find matching candidates."
        .into()
}

fn default_error_message() -> String {
    "Sorry, I encountered an error. Please try again.".into()
}

fn default_follow_up_delay_ms() -> u64 {
    1000
}

fn default_searching_indicator_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    64
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            student_welcome: default_student_welcome(),
            company_welcome: default_company_welcome(),
            error_message: default_error_message(),
            follow_up_delay_ms: default_follow_up_delay_ms(),
            searching_indicator_ms: default_searching_indicator_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ChatConfig {
    pub fn welcome_for(&self, user_type: UserType) -> &str {
        match user_type {
            UserType::Student => &self.student_welcome,
            UserType::Company => &self.company_welcome,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file for saved sessions; `~` is expanded. Defaults to
    /// `<data_dir>/sessions.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let data_dir = home.join(DATA_DIR_NAME);

        Self {
            config_path: data_dir.join(CONFIG_FILE_NAME),
            data_dir,
            log_level: default_log_level(),
            default_user_type: UserType::default(),
            api: ApiConfig::default(),
            chat: ChatConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let mut config = Self::load_or_init_in(&home.join(DATA_DIR_NAME))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from `data_dir`, writing defaults when it is absent.
    pub fn load_or_init_in(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        if !data_dir.exists() {
            fs::create_dir_all(data_dir).context("Failed to create .internhub directory")?;
        }

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("read {}", config_path.display()))?;
            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("parse {}", config_path.display()))?;
            config.config_path.clone_from(&config_path);
            config.data_dir = data_dir.to_path_buf();
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                data_dir: data_dir.to_path_buf(),
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    /// `INTERNHUB_*` variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        // Base URL: INTERNHUB_API_URL
        if let Ok(url) = std::env::var("INTERNHUB_API_URL") {
            if !url.is_empty() {
                self.api.base_url = url;
            }
        }

        // Token: INTERNHUB_API_TOKEN
        if let Ok(token) = std::env::var("INTERNHUB_API_TOKEN") {
            if !token.is_empty() {
                self.api.auth_token = Some(token);
            }
        }

        // User type: INTERNHUB_USER_TYPE
        if let Ok(raw) = std::env::var("INTERNHUB_USER_TYPE") {
            match raw.parse::<UserType>() {
                Ok(user_type) => self.default_user_type = user_type,
                Err(_) => tracing::warn!(value = %raw, "Ignoring unknown INTERNHUB_USER_TYPE"),
            }
        }

        // Log level: INTERNHUB_LOG
        if let Ok(level) = std::env::var("INTERNHUB_LOG") {
            if !level.is_empty() {
                self.log_level = level.to_ascii_lowercase();
            }
        }

        // Store path: INTERNHUB_STORE
        if let Ok(path) = std::env::var("INTERNHUB_STORE") {
            if !path.is_empty() {
                self.store.path = Some(path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("api.base_url must use http or https");
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be >= 1");
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            anyhow::bail!(
                "log_level must be one of {}, got {}",
                LOG_LEVELS.join(", "),
                self.log_level
            );
        }
        if self.chat.event_capacity == 0 {
            anyhow::bail!("chat.event_capacity must be >= 1");
        }
        Ok(())
    }

    /// Resolved location of the session database.
    pub fn store_path(&self) -> PathBuf {
        match self.store.path.as_deref() {
            Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
            None => self.data_dir.join(DEFAULT_STORE_FILE),
        }
    }

    pub fn save(&self) -> Result<()> {
        let rendered = toml::to_string_pretty(self).context("serialize config")?;
        fs::write(&self.config_path, rendered)
            .with_context(|| format!("write {}", self.config_path.display()))?;
        Ok(())
    }
}
