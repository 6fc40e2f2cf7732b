use super::types::{ChatPhase, Message, MessageMetadata, MessageRole, Session, UserType};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

/// Durable home for chat sessions and their message logs.
pub trait SessionStore: Send + Sync {
    /// Insert the session header, or update name/phase/welcome flag when it exists.
    fn upsert_session<'a>(
        &'a self,
        session: &'a Session,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn get_session<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>>> + Send + 'a>>;

    /// Sessions with their messages, newest first.
    fn list_sessions<'a>(
        &'a self,
        user_type: Option<UserType>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>>> + Send + 'a>>;

    fn delete_session<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    fn append_message<'a>(
        &'a self,
        session_id: &'a str,
        message: &'a Message,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn count_messages<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>>;
}

/// `SessionStore` over a sqlx SQLite pool.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

const AI_STORE_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS ai_store_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const AI_STORE_VERSION_KEY: &str = "ai_store_version";
const AI_STORE_VERSION: u32 = 1;

async fn check_store_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(AI_STORE_META_TABLE)
        .execute(pool)
        .await
        .context("create store metadata table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM ai_store_meta WHERE key = $1")
            .bind(AI_STORE_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("read store version")?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("unreadable store version {value:?}"))?;
        anyhow::ensure!(
            parsed == AI_STORE_VERSION,
            "session database is version {parsed}, this build expects {AI_STORE_VERSION}; \
move the file aside to start fresh"
        );
        return Ok(());
    }

    sqlx::query("INSERT INTO ai_store_meta (key, value) VALUES ($1, $2)")
        .bind(AI_STORE_VERSION_KEY)
        .bind(AI_STORE_VERSION.to_string())
        .execute(pool)
        .await
        .context("record store version")?;

    Ok(())
}

impl SqliteSessionStore {
    /// Wrap an existing pool, creating tables on first use.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;

        check_store_version(&pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ai_sessions (
                 id TEXT PRIMARY KEY,
                 user_type TEXT NOT NULL,
                 name TEXT NOT NULL,
                 phase TEXT NOT NULL DEFAULT 'intro',
                 welcome_sent INTEGER NOT NULL DEFAULT 0,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ai_messages (
                 id TEXT PRIMARY KEY,
                 session_id TEXT NOT NULL REFERENCES ai_sessions(id) ON DELETE CASCADE,
                 seq INTEGER NOT NULL,
                 role TEXT NOT NULL,
                 content TEXT NOT NULL,
                 metadata TEXT,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ai_messages_session
                 ON ai_messages(session_id, seq)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Open (creating if needed) a database file.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("open session database {}", path.display()))?;
        Self::new(pool).await
    }

    /// Throwaway store that lives as long as the pool.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("open in-memory session database")?;
        Self::new(pool).await
    }

    async fn messages_for(&self, session_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, role, content, metadata, created_at
             FROM ai_messages
             WHERE session_id = $1
             ORDER BY seq ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .context("query session messages")?;

        rows.iter().map(map_message_row).collect()
    }
}

fn map_session_row(row: &SqliteRow, messages: Vec<Message>) -> Result<Session> {
    let user_type_raw: String = row.try_get("user_type")?;
    let phase_raw: String = row.try_get("phase")?;
    let welcome_sent: i64 = row.try_get("welcome_sent")?;

    Ok(Session {
        id: row.try_get("id")?,
        user_type: user_type_raw
            .parse::<UserType>()
            .with_context(|| format!("unknown user type: {user_type_raw}"))?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        phase: phase_raw
            .parse::<ChatPhase>()
            .with_context(|| format!("unknown chat phase: {phase_raw}"))?,
        welcome_sent: welcome_sent != 0,
        messages,
    })
}

fn map_message_row(row: &SqliteRow) -> Result<Message> {
    let role_raw: String = row.try_get("role")?;
    let metadata_raw: Option<String> = row.try_get("metadata")?;
    let metadata = metadata_raw
        .map(|value| serde_json::from_str::<MessageMetadata>(&value))
        .transpose()
        .context("deserialize message metadata")?;

    Ok(Message {
        id: row.try_get("id")?,
        role: role_raw
            .parse::<MessageRole>()
            .with_context(|| format!("unknown message role: {role_raw}"))?,
        content: row.try_get("content")?,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}

impl SessionStore for SqliteSessionStore {
    fn upsert_session<'a>(
        &'a self,
        session: &'a Session,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let timestamp = Utc::now().to_rfc3339();
            sqlx::query(
                "INSERT INTO ai_sessions (id, user_type, name, phase, welcome_sent, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     phase = excluded.phase,
                     welcome_sent = excluded.welcome_sent,
                     updated_at = excluded.updated_at",
            )
            .bind(&session.id)
            .bind(session.user_type.as_ref())
            .bind(&session.name)
            .bind(session.phase.as_ref())
            .bind(i64::from(session.welcome_sent))
            .bind(&session.created_at)
            .bind(&timestamp)
            .execute(&self.pool)
            .await
            .context("upsert session")?;
            Ok(())
        })
    }

    fn get_session<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, user_type, name, phase, welcome_sent, created_at
                 FROM ai_sessions
                 WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("load session header")?;

            let Some(row) = row else {
                return Ok(None);
            };
            let messages = self.messages_for(id).await?;
            map_session_row(&row, messages).map(Some)
        })
    }

    fn list_sessions<'a>(
        &'a self,
        user_type: Option<UserType>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>>> + Send + 'a>> {
        Box::pin(async move {
            let rows = if let Some(user_type) = user_type {
                sqlx::query(
                    "SELECT id, user_type, name, phase, welcome_sent, created_at
                     FROM ai_sessions
                     WHERE user_type = $1
                     ORDER BY updated_at DESC",
                )
                .bind(user_type.as_ref())
                .fetch_all(&self.pool)
                .await?
            } else {
                sqlx::query(
                    "SELECT id, user_type, name, phase, welcome_sent, created_at
                     FROM ai_sessions
                     ORDER BY updated_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            };

            let mut sessions = Vec::with_capacity(rows.len());
            for row in &rows {
                let id: String = row.try_get("id")?;
                let messages = self.messages_for(&id).await?;
                sessions.push(map_session_row(row, messages)?);
            }
            Ok(sessions)
        })
    }

    fn delete_session<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM ai_sessions WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn append_message<'a>(
        &'a self,
        session_id: &'a str,
        message: &'a Message,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let metadata = message
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("serialize message metadata")?;

            sqlx::query(
                "INSERT INTO ai_messages (id, session_id, seq, role, content, metadata, created_at)
                 VALUES ($1, $2,
                         (SELECT COALESCE(MAX(seq), 0) + 1 FROM ai_messages WHERE session_id = $2),
                         $3, $4, $5, $6)",
            )
            .bind(&message.id)
            .bind(session_id)
            .bind(message.role.as_ref())
            .bind(&message.content)
            .bind(metadata)
            .bind(&message.created_at)
            .execute(&self.pool)
            .await
            .context("insert message")?;

            sqlx::query(
                "UPDATE ai_sessions
                 SET updated_at = $1
                 WHERE id = $2",
            )
            .bind(Utc::now().to_rfc3339())
            .bind(session_id)
            .execute(&self.pool)
            .await?;

            Ok(())
        })
    }

    fn count_messages<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT COUNT(*) as cnt FROM ai_messages WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;

            let count: i64 = row.try_get("cnt")?;
            usize::try_from(count).context("negative message count")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AI_STORE_META_TABLE, AI_STORE_VERSION_KEY, SessionStore, SqliteSessionStore,
    };
    use crate::session::types::{
        ChatPhase, Message, MessageMetadata, MessageRole, Session, UserType,
    };
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteSessionStore {
        SqliteSessionStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_header() {
        let store = store().await;
        let mut session = Session::new(UserType::Student);
        session.name = "Data roles".into();
        store.upsert_session(&session).await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Data roles");
        assert_eq!(loaded.user_type, UserType::Student);
        assert_eq!(loaded.phase, ChatPhase::Intro);
        assert!(!loaded.welcome_sent);
    }

    #[tokio::test]
    async fn upsert_updates_phase_and_welcome_flag() {
        let store = store().await;
        let mut session = Session::new(UserType::Company);
        store.upsert_session(&session).await.unwrap();

        session.phase = ChatPhase::Results;
        session.welcome_sent = true;
        store.upsert_session(&session).await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.phase, ChatPhase::Results);
        assert!(loaded.welcome_sent);
    }

    #[tokio::test]
    async fn get_session_returns_none_for_missing() {
        let store = store().await;
        assert!(store.get_session("missing-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn messages_come_back_in_insertion_order_with_metadata() {
        let store = store().await;
        let session = Session::new(UserType::Company);
        store.upsert_session(&session).await.unwrap();

        let first = Message::new(MessageRole::User, "React developer");
        let second = Message::new(MessageRole::Assistant, "Any seniority?").with_metadata(
            MessageMetadata::from_parts(Some("question".into()), Some(serde_json::json!({"n": 1}))),
        );
        let third = Message::new(MessageRole::User, "Junior");
        for message in [&first, &second, &third] {
            store.append_message(&session.id, message).await.unwrap();
        }

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        let contents: Vec<&str> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["React developer", "Any seniority?", "Junior"]);
        assert_eq!(loaded.messages[1], second);
        assert_eq!(store.count_messages(&session.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn list_sessions_filters_by_user_type() {
        let store = store().await;
        store
            .upsert_session(&Session::new(UserType::Student))
            .await
            .unwrap();
        store
            .upsert_session(&Session::new(UserType::Company))
            .await
            .unwrap();

        let all = store.list_sessions(None).await.unwrap();
        let students = store.list_sessions(Some(UserType::Student)).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].user_type, UserType::Student);
    }

    #[tokio::test]
    async fn delete_session_cascades_messages() {
        let store = store().await;
        let session = Session::new(UserType::Company);
        store.upsert_session(&session).await.unwrap();
        store
            .append_message(&session.id, &Message::new(MessageRole::User, "hi"))
            .await
            .unwrap();

        assert!(store.delete_session(&session.id).await.unwrap());
        assert!(!store.delete_session(&session.id).await.unwrap());
        assert_eq!(store.count_messages(&session.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let store = SqliteSessionStore::open(&path).await.unwrap();
        store
            .upsert_session(&Session::new(UserType::Company))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn new_rejects_unknown_store_version() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(AI_STORE_META_TABLE)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO ai_store_meta (key, value) VALUES ($1, $2)")
            .bind(AI_STORE_VERSION_KEY)
            .bind("999")
            .execute(&pool)
            .await
            .unwrap();

        let err = match SqliteSessionStore::new(pool).await {
            Ok(_) => panic!("opening a newer database should fail"),
            Err(err) => err,
        };
        assert!(
            err.to_string()
                .contains("this build expects"),
            "unexpected error: {err}"
        );
    }
}
