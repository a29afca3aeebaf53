use async_trait::async_trait;
use thiserror::Error;

use super::merge::{BatchOutcome, OutcomeKind};
use crate::types::ConversationId;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    Closed,

    #[error("Failed to deliver notification: {message}")]
    Delivery { message: String },
}

/// Receives the result of every merge into a session's item list.
///
/// Delivery is best-effort. Callers log a failed `notify` and carry on; the
/// merge it reports on has already been committed.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        conversation_id: ConversationId,
        outcome: &BatchOutcome,
    ) -> Result<(), NotifyError>;
}

/// User-facing text for a merge outcome.
pub fn describe_outcome(outcome: &BatchOutcome) -> String {
    match outcome.kind() {
        OutcomeKind::Added => format!(
            "Added {} photo(s). Total: {}/{}.",
            outcome.accepted, outcome.total, outcome.limit
        ),
        OutcomeKind::Truncated => format!(
            "Added {} of {} photo(s): the limit is {}. Total: {}/{}.",
            outcome.accepted, outcome.offered, outcome.limit, outcome.total, outcome.limit
        ),
        OutcomeKind::LimitReached => format!(
            "Photo limit of {} already reached. Press \"Done\" to continue.",
            outcome.limit
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_distinct_from_exact_fit() {
        let exact = BatchOutcome {
            offered: 2,
            accepted: 2,
            total: 6,
            limit: 6,
        };
        let truncated = BatchOutcome {
            offered: 3,
            accepted: 2,
            total: 6,
            limit: 6,
        };

        assert_eq!(describe_outcome(&exact), "Added 2 photo(s). Total: 6/6.");
        assert_eq!(
            describe_outcome(&truncated),
            "Added 2 of 3 photo(s): the limit is 6. Total: 6/6."
        );
    }

    #[test]
    fn limit_reached_mentions_limit() {
        let outcome = BatchOutcome {
            offered: 1,
            accepted: 0,
            total: 4,
            limit: 4,
        };
        assert!(describe_outcome(&outcome).contains("limit of 4"));
    }
}
