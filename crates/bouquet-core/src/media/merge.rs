use serde::{Deserialize, Serialize};

use crate::types::ItemRef;

/// Result of folding one finalized album into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Items the album delivered.
    pub offered: usize,
    /// Items that fit under the limit and were kept.
    pub accepted: usize,
    /// Item count after the merge.
    pub total: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Every offered item was kept.
    Added,
    /// Some items were kept, the rest did not fit.
    Truncated,
    /// The session was already full; nothing was kept.
    LimitReached,
}

impl BatchOutcome {
    pub fn kind(&self) -> OutcomeKind {
        if self.accepted == 0 {
            OutcomeKind::LimitReached
        } else if self.accepted < self.offered {
            OutcomeKind::Truncated
        } else {
            OutcomeKind::Added
        }
    }

    pub fn discarded(&self) -> usize {
        self.offered - self.accepted
    }
}

/// Appends as much of `incoming` to `items` as `limit` allows, in order.
///
/// Overflow is dropped. If `items` is already over `limit` nothing is
/// appended and nothing is removed.
pub fn merge_capped(items: &mut Vec<ItemRef>, limit: usize, incoming: Vec<ItemRef>) -> BatchOutcome {
    let offered = incoming.len();
    let headroom = limit.saturating_sub(items.len());
    let accepted = offered.min(headroom);
    items.extend(incoming.into_iter().take(accepted));

    BatchOutcome {
        offered,
        accepted,
        total: items.len(),
        limit,
    }
}
