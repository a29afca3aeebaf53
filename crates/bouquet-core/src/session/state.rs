use serde::{Deserialize, Serialize};
use strum::Display;

use crate::catalog::CompositionItem;
use crate::types::ItemRef;

/// Limit used until a user picks their own.
pub const DEFAULT_MEDIA_LIMIT: usize = 6;

/// Where a conversation currently is in the bouquet flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    WaitingTitle,
    WaitingMedia,
    WaitingVideo,
    WaitingDescription,
    WaitingComposition,
    WaitingPrice,
    ChoosingCategory,
    ChoosingProduct,
    EnteringQuantity,
    EditingTitle,
    EditingDescription,
    EditingComposition,
    EditingPrice,
    WaitingPhotoLimit,
}

impl Stage {
    /// Whether new attachments are taken at this stage.
    pub fn accepts_media(self) -> bool {
        matches!(self, Stage::WaitingMedia)
    }

    /// Whether a bouquet draft is still being assembled. Albums that were
    /// buffered during the media stage finalize into any of these.
    pub fn holds_draft(self) -> bool {
        matches!(
            self,
            Stage::WaitingTitle
                | Stage::WaitingMedia
                | Stage::WaitingVideo
                | Stage::WaitingDescription
                | Stage::WaitingComposition
                | Stage::WaitingPrice
                | Stage::ChoosingCategory
                | Stage::ChoosingProduct
                | Stage::EnteringQuantity
        )
    }
}

/// Fields of the bouquet being assembled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub bouquet_id: Option<String>,
    /// Row id of the owning user in the repository.
    pub owner_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub composition: Vec<CompositionItem>,
    /// Whole currency units.
    pub price: Option<u32>,
    pub video: Option<String>,
}

/// Mutable per-conversation state.
///
/// `items.len() <= capacity` holds after every mutation made through the
/// media path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub items: Vec<ItemRef>,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub draft: Draft,
    #[serde(default)]
    pub selected_product: Option<i64>,
    /// Bouquet id targeted by an `Editing*` stage.
    #[serde(default)]
    pub editing: Option<String>,
}

fn default_capacity() -> usize {
    DEFAULT_MEDIA_LIMIT
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            items: Vec::new(),
            capacity: DEFAULT_MEDIA_LIMIT,
            draft: Draft::default(),
            selected_product: None,
            editing: None,
        }
    }
}

impl SessionState {
    pub fn headroom(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }
}
