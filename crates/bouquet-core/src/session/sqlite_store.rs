use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tokio::sync::Mutex as AsyncMutex;

use super::state::SessionState;
use super::store::{Mutator, SessionStore, SessionStoreError};
use crate::types::ConversationId;

/// Session store backed by a single SQLite table of JSON documents.
///
/// Read-modify-write cycles for one conversation are serialized by a
/// per-conversation async lock; the row is only written after the mutator
/// returns, so a failed write leaves the previous state in place.
pub struct SqliteSessionStore {
    pool: SqlitePool,
    locks: Mutex<HashMap<ConversationId, Arc<AsyncMutex<()>>>>,
}

impl SqliteSessionStore {
    pub async fn new(path: &Path) -> Result<Self, SessionStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionStoreError::connection(format!("Failed to create directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| SessionStoreError::connection(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        Self::connect(options).await
    }

    pub async fn new_in_memory() -> Result<Self, SessionStoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SessionStoreError::connection(format!("Invalid SQLite path: {e}")))?;

        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, SessionStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                SessionStoreError::connection(format!("Failed to connect to SQLite: {e}"))
            })?;

        let store = Self {
            pool,
            locks: Mutex::new(HashMap::new()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_states (
                conversation_id INTEGER PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::Migration {
            message: format!("Failed to create session_states table: {e}"),
        })?;

        Ok(())
    }

    fn lock_for(&self, conversation_id: ConversationId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(conversation_id).or_default().clone()
    }

    /// Drops the lock entry once no caller holds or waits on it.
    fn release_lock(&self, conversation_id: ConversationId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&conversation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&conversation_id);
        }
    }

    async fn load(&self, conversation_id: ConversationId) -> Result<SessionState, SessionStoreError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT state FROM session_states WHERE conversation_id = ?1")
                .bind(conversation_id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SessionStoreError::database(format!("Failed to load session: {e}")))?;

        match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                SessionStoreError::serialization(format!("Invalid session state: {e}"))
            }),
            None => Ok(SessionState::default()),
        }
    }

    async fn save(
        &self,
        conversation_id: ConversationId,
        state: &SessionState,
    ) -> Result<(), SessionStoreError> {
        let raw = serde_json::to_string(state).map_err(|e| {
            SessionStoreError::serialization(format!("Failed to serialize session state: {e}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO session_states (conversation_id, state, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(conversation_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(conversation_id.0)
        .bind(raw)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionStoreError::database(format!("Failed to save session: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(
        &self,
        conversation_id: ConversationId,
    ) -> Result<SessionState, SessionStoreError> {
        self.load(conversation_id).await
    }

    async fn set(
        &self,
        conversation_id: ConversationId,
        state: SessionState,
    ) -> Result<(), SessionStoreError> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().await;
        self.save(conversation_id, &state).await
    }

    async fn update<'a>(
        &'a self,
        conversation_id: ConversationId,
        mutator: Mutator<'a>,
    ) -> Result<SessionState, SessionStoreError> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().await;

        let mut state = self.load(conversation_id).await?;
        mutator(&mut state);
        self.save(conversation_id, &state).await?;
        Ok(state)
    }

    async fn clear(&self, conversation_id: ConversationId) -> Result<(), SessionStoreError> {
        let lock = self.lock_for(conversation_id);
        let guard = lock.lock().await;

        let deleted = sqlx::query("DELETE FROM session_states WHERE conversation_id = ?1")
            .bind(conversation_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionStoreError::database(format!("Failed to clear session: {e}")));

        drop(guard);
        drop(lock);
        self.release_lock(conversation_id);
        deleted.map(|_| ())
    }
}
