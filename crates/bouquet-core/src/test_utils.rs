//! Test doubles shared by unit and integration tests.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::media::{BatchOutcome, NotificationSink, NotifyError};
use crate::session::{Mutator, SessionState, SessionStore, SessionStoreError};
use crate::types::{ConversationId, ItemRef};
use crate::upload::{MediaUploader, UploadError};

/// Sink that remembers every outcome it was handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<(ConversationId, BatchOutcome)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records and then reports delivery failure.
    pub fn failing() -> Self {
        Self {
            outcomes: Mutex::default(),
            fail: true,
        }
    }

    pub fn outcomes(&self) -> Vec<(ConversationId, BatchOutcome)> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        conversation_id: ConversationId,
        outcome: &BatchOutcome,
    ) -> Result<(), NotifyError> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((conversation_id, *outcome));
        if self.fail {
            return Err(NotifyError::Delivery {
                message: format!("conversation {conversation_id} rejected the message"),
            });
        }
        Ok(())
    }
}

/// Store whose reads succeed with the default state and whose writes fail.
#[derive(Debug, Default)]
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn get(
        &self,
        _conversation_id: ConversationId,
    ) -> Result<SessionState, SessionStoreError> {
        Ok(SessionState::default())
    }

    async fn set(
        &self,
        _conversation_id: ConversationId,
        _state: SessionState,
    ) -> Result<(), SessionStoreError> {
        Err(SessionStoreError::database("store unavailable"))
    }

    async fn update<'a>(
        &'a self,
        _conversation_id: ConversationId,
        _mutator: Mutator<'a>,
    ) -> Result<SessionState, SessionStoreError> {
        Err(SessionStoreError::database("store unavailable"))
    }
}

/// Uploader that fabricates URLs under `base` and records what it stored.
#[derive(Debug)]
pub struct InMemoryUploader {
    base: String,
    failing: HashSet<String>,
    uploaded: Mutex<Vec<String>>,
}

impl InMemoryUploader {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            failing: HashSet::new(),
            uploaded: Mutex::default(),
        }
    }

    /// Makes uploads of `item` fail.
    pub fn failing_on(mut self, item: &str) -> Self {
        self.failing.insert(item.to_string());
        self
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, item: &ItemRef, url: String) -> Result<Option<String>, UploadError> {
        if self.failing.contains(item.as_str()) {
            return Err(UploadError::Storage {
                message: format!("refused {item}"),
            });
        }
        self.uploaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());
        Ok(Some(url))
    }
}

#[async_trait]
impl MediaUploader for InMemoryUploader {
    async fn upload_photo(
        &self,
        item: &ItemRef,
        bouquet_id: &str,
        index: usize,
    ) -> Result<Option<String>, UploadError> {
        let url = format!("{}/bouquets/{bouquet_id}/{index}-{item}.jpg", self.base);
        self.store(item, url)
    }

    async fn upload_video(
        &self,
        item: &ItemRef,
        bouquet_id: &str,
    ) -> Result<Option<String>, UploadError> {
        let url = format!("{}/bouquets/{bouquet_id}/{item}.mp4", self.base);
        self.store(item, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_sink_records_before_reporting_delivery_failure() {
        let sink = RecordingSink::failing();
        let outcome = BatchOutcome {
            offered: 1,
            accepted: 1,
            total: 1,
            limit: 6,
        };

        let err = sink.notify(ConversationId(9), &outcome).await.unwrap_err();

        assert!(matches!(err, NotifyError::Delivery { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to deliver notification: conversation 9 rejected the message"
        );
        assert_eq!(sink.outcomes(), vec![(ConversationId(9), outcome)]);
    }
}
