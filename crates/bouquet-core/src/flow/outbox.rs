use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::FlowError;
use super::callback::CallbackAction;
use super::keyboards;
use crate::media::{BatchOutcome, NotificationSink, NotifyError, describe_outcome};
use crate::types::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            text: text.into(),
            data: action.to_string(),
        }
    }
}

/// A reply addressed to one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub conversation_id: ConversationId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Vec<Button>>,
}

impl OutboundMessage {
    pub fn text(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation_id,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Vec<Button>>) -> Self {
        self.buttons = buttons;
        self
    }

    /// Every button payload, row by row.
    pub fn actions(&self) -> Vec<String> {
        self.buttons
            .iter()
            .flatten()
            .map(|b| b.data.clone())
            .collect()
    }
}

/// Sending half of the reply channel.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: OutboundMessage) -> Result<(), FlowError> {
        self.tx.send(message).map_err(|_| FlowError::OutboxClosed)
    }
}

#[async_trait]
impl NotificationSink for Outbox {
    async fn notify(
        &self,
        conversation_id: ConversationId,
        outcome: &BatchOutcome,
    ) -> Result<(), NotifyError> {
        let message = OutboundMessage::text(conversation_id, describe_outcome(outcome))
            .with_buttons(keyboards::media_controls());
        self.tx.send(message).map_err(|_| NotifyError::Closed)
    }
}
