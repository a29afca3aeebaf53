//! Entry point for attachment arrivals.
//!
//! Attachments without a batch id are merged into the session on the spot.
//! Attachments that carry one are buffered in the [`BatchAccumulator`]; the
//! first item of a batch arms a single deferred finalize that drains the
//! buffer once the quiet window has elapsed and merges it under the
//! session's capacity.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::accumulator::BatchAccumulator;
use super::merge::{BatchOutcome, merge_capped};
use super::notify::NotificationSink;
use super::scheduler::DebounceScheduler;
use crate::session::{SessionStore, SessionStoreError, update_with};
use crate::types::{BatchId, ConversationId, ItemRef};

/// One attachment as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentEvent {
    pub conversation_id: ConversationId,
    pub item_ref: ItemRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
}

/// What happened to an attachment by the time `handle_arrival` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Merged directly; the outcome has already been reported.
    Merged(BatchOutcome),
    /// Buffered for a later finalize. `position` is the buffer length after
    /// the append.
    Buffered { position: usize },
    /// The conversation is not collecting media.
    Ignored,
}

struct Inner {
    accumulator: BatchAccumulator,
    scheduler: DebounceScheduler,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn NotificationSink>,
}

#[derive(Clone)]
pub struct MediaIngestor {
    inner: Arc<Inner>,
}

impl MediaIngestor {
    pub fn new(
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn NotificationSink>,
        quiet_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                accumulator: BatchAccumulator::new(),
                scheduler: DebounceScheduler::new(quiet_window),
                store,
                sink,
            }),
        }
    }

    pub async fn handle_arrival(
        &self,
        event: AttachmentEvent,
    ) -> Result<Arrival, SessionStoreError> {
        let AttachmentEvent {
            conversation_id,
            item_ref,
            batch_id,
        } = event;

        match batch_id {
            None => self.merge_single(conversation_id, item_ref).await,
            Some(batch_id) => Ok(self.buffer(conversation_id, batch_id, item_ref).await),
        }
    }

    async fn merge_single(
        &self,
        conversation_id: ConversationId,
        item_ref: ItemRef,
    ) -> Result<Arrival, SessionStoreError> {
        let outcome = update_with(self.inner.store.as_ref(), conversation_id, |state| {
            if !state.stage.accepts_media() {
                return None;
            }
            let limit = state.capacity;
            Some(merge_capped(&mut state.items, limit, vec![item_ref]))
        })
        .await?;

        let Some(outcome) = outcome else {
            debug!(
                target: "bouquet::media::ingest",
                conversation_id = %conversation_id,
                "Ignoring attachment outside media stage"
            );
            return Ok(Arrival::Ignored);
        };

        self.report(conversation_id, &outcome).await;
        Ok(Arrival::Merged(outcome))
    }

    async fn buffer(
        &self,
        conversation_id: ConversationId,
        batch_id: BatchId,
        item_ref: ItemRef,
    ) -> Arrival {
        let position = self.inner.accumulator.append(&batch_id, item_ref).await;
        debug!(
            target: "bouquet::media::ingest",
            conversation_id = %conversation_id,
            batch_id = %batch_id,
            position,
            "Buffered album item"
        );

        if position == 1 {
            let ingestor = self.clone();
            let finalize_id = batch_id.clone();
            self.inner.scheduler.arm(batch_id, async move {
                ingestor.finalize(conversation_id, &finalize_id).await;
            });
        }

        Arrival::Buffered { position }
    }

    /// Drains `batch_id` and merges it into the conversation's items.
    ///
    /// Never fails: store errors lose the drained items and are logged, and
    /// notification failures are logged after the merge has been committed.
    /// Returns the reported outcome, if any.
    pub async fn finalize(
        &self,
        conversation_id: ConversationId,
        batch_id: &BatchId,
    ) -> Option<BatchOutcome> {
        let drained = self.inner.accumulator.drain_and_remove(batch_id).await;
        if drained.is_empty() {
            debug!(
                target: "bouquet::media::ingest",
                batch_id = %batch_id,
                "Finalize found nothing buffered"
            );
            return None;
        }

        let drained_len = drained.len();
        let merged = update_with(self.inner.store.as_ref(), conversation_id, move |state| {
            if !state.stage.holds_draft() {
                return Err(state.stage);
            }
            let limit = state.capacity;
            Ok(merge_capped(&mut state.items, limit, drained))
        })
        .await;

        let outcome = match merged {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(stage)) => {
                warn!(
                    target: "bouquet::media::ingest",
                    conversation_id = %conversation_id,
                    batch_id = %batch_id,
                    stage = %stage,
                    dropped = drained_len,
                    "Album finalized after the draft was closed, dropping items"
                );
                return None;
            }
            Err(e) => {
                error!(
                    target: "bouquet::media::ingest",
                    conversation_id = %conversation_id,
                    batch_id = %batch_id,
                    lost = drained_len,
                    error = %e,
                    "Failed to merge album into session"
                );
                return None;
            }
        };

        info!(
            target: "bouquet::media::ingest",
            conversation_id = %conversation_id,
            batch_id = %batch_id,
            offered = outcome.offered,
            accepted = outcome.accepted,
            total = outcome.total,
            limit = outcome.limit,
            "Album merged"
        );

        self.report(conversation_id, &outcome).await;
        Some(outcome)
    }

    async fn report(&self, conversation_id: ConversationId, outcome: &BatchOutcome) {
        if let Err(e) = self.inner.sink.notify(conversation_id, outcome).await {
            warn!(
                target: "bouquet::media::ingest",
                conversation_id = %conversation_id,
                error = %e,
                "Failed to deliver media notification"
            );
        }
    }

    /// Number of albums still inside their quiet window.
    pub fn pending(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Waits for every armed finalize to complete.
    pub async fn wait_idle(&self) {
        self.inner.scheduler.wait_idle().await;
    }
}

impl std::fmt::Debug for MediaIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaIngestor")
            .field("scheduler", &self.inner.scheduler)
            .field("open_batches", &self.inner.accumulator.open_batches())
            .finish_non_exhaustive()
    }
}
