use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::media::AttachmentEvent;
use crate::types::{BatchId, ConversationId, ItemRef, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    Start,
    Help,
    #[strum(to_string = "new_bouquet", serialize = "new")]
    NewBouquet,
    #[strum(to_string = "list_bouquets", serialize = "list", serialize = "my_bouquets")]
    ListBouquets,
    Settings,
}

impl Command {
    /// Parses `/start`, `/new`, `/list@botname` and friends.
    pub fn from_slash(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let word = word.split('@').next()?;
        word.to_ascii_lowercase().parse().ok()
    }
}

/// One event from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Command {
        conversation_id: ConversationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        command: Command,
    },
    Text {
        conversation_id: ConversationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        text: String,
    },
    Attachment {
        conversation_id: ConversationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        item_ref: ItemRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        batch_id: Option<BatchId>,
        /// Set for documents; absent for native photos and videos.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
        /// Native video, as opposed to a photo.
        #[serde(default)]
        video: bool,
    },
    Action {
        conversation_id: ConversationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        data: String,
    },
}

impl Inbound {
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Inbound::Command {
                conversation_id, ..
            }
            | Inbound::Text {
                conversation_id, ..
            }
            | Inbound::Attachment {
                conversation_id, ..
            }
            | Inbound::Action {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Sender of the event. Private chats share their id with the user, so
    /// that is the fallback.
    pub fn user_id(&self) -> UserId {
        let explicit = match self {
            Inbound::Command { user_id, .. }
            | Inbound::Text { user_id, .. }
            | Inbound::Attachment { user_id, .. }
            | Inbound::Action { user_id, .. } => *user_id,
        };
        explicit.unwrap_or(UserId(self.conversation_id().0))
    }
}

/// Where an attachment goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRoute {
    /// Photos and `image/*` documents: the album accumulator.
    Image(AttachmentEvent),
    /// Native videos and `video/*` documents.
    Video(ItemRef),
    Unsupported { mime: String },
}

pub fn classify_attachment(
    conversation_id: ConversationId,
    item_ref: ItemRef,
    batch_id: Option<BatchId>,
    mime: Option<&str>,
    video: bool,
) -> MediaRoute {
    if video {
        return MediaRoute::Video(item_ref);
    }
    match mime.map(|m| m.trim().to_ascii_lowercase()) {
        None => MediaRoute::Image(AttachmentEvent {
            conversation_id,
            item_ref,
            batch_id,
        }),
        Some(m) if m.starts_with("image/") => MediaRoute::Image(AttachmentEvent {
            conversation_id,
            item_ref,
            batch_id,
        }),
        Some(m) if m.starts_with("video/") => MediaRoute::Video(item_ref),
        Some(mime) => MediaRoute::Unsupported { mime },
    }
}
