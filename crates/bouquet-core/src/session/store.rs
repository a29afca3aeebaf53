use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use super::state::SessionState;
use crate::types::ConversationId;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("Session update for {conversation_id} was not applied")]
    NotApplied { conversation_id: String },
}

impl SessionStoreError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

/// Read-modify-write step applied to one conversation's state.
pub type Mutator<'a> = Box<dyn FnOnce(&mut SessionState) + Send + 'a>;

/// Per-conversation state storage.
///
/// Updates to the same conversation are serialized; updates to different
/// conversations do not wait on each other. A mutator either lands in full
/// or, when the store fails, not at all.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the stored state, or the default state for unknown ids.
    async fn get(&self, conversation_id: ConversationId)
    -> Result<SessionState, SessionStoreError>;

    async fn set(
        &self,
        conversation_id: ConversationId,
        state: SessionState,
    ) -> Result<(), SessionStoreError>;

    /// Applies `mutator` atomically and returns the state it produced.
    async fn update<'a>(
        &'a self,
        conversation_id: ConversationId,
        mutator: Mutator<'a>,
    ) -> Result<SessionState, SessionStoreError>;

    async fn clear(&self, conversation_id: ConversationId) -> Result<(), SessionStoreError> {
        self.set(conversation_id, SessionState::default()).await
    }
}

/// Runs `f` inside [`SessionStore::update`] and hands back its return value.
pub async fn update_with<S, F, R>(
    store: &S,
    conversation_id: ConversationId,
    f: F,
) -> Result<R, SessionStoreError>
where
    S: SessionStore + ?Sized,
    F: FnOnce(&mut SessionState) -> R + Send,
    R: Send,
{
    let mut out = None;
    store
        .update(
            conversation_id,
            Box::new(|state: &mut SessionState| out = Some(f(state))),
        )
        .await?;
    out.ok_or_else(|| SessionStoreError::NotApplied {
        conversation_id: conversation_id.to_string(),
    })
}

type Entry = Arc<Mutex<SessionState>>;

/// Process-local store. Each conversation has its own lock, created lazily.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<ConversationId, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, conversation_id: ConversationId) -> Entry {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.entry(conversation_id).or_default().clone()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(
        &self,
        conversation_id: ConversationId,
    ) -> Result<SessionState, SessionStoreError> {
        let entry = self.entry(conversation_id);
        let state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.clone())
    }

    async fn set(
        &self,
        conversation_id: ConversationId,
        state: SessionState,
    ) -> Result<(), SessionStoreError> {
        let entry = self.entry(conversation_id);
        *entry.lock().unwrap_or_else(PoisonError::into_inner) = state;
        Ok(())
    }

    async fn update<'a>(
        &'a self,
        conversation_id: ConversationId,
        mutator: Mutator<'a>,
    ) -> Result<SessionState, SessionStoreError> {
        let entry = self.entry(conversation_id);
        let mut current = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        mutator(&mut next);
        *current = next.clone();
        Ok(next)
    }

    async fn clear(&self, conversation_id: ConversationId) -> Result<(), SessionStoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(&conversation_id) else {
            return Ok(());
        };
        // Unknown ids read as the default state, so an unshared entry can go.
        if Arc::strong_count(entry) == 1 {
            entries.remove(&conversation_id);
        } else {
            *entry.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::default();
        }
        Ok(())
    }
}
