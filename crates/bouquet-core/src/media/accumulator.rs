//! Per-album buffers for attachments that arrive as independent messages.
//!
//! Each batch id owns one slot guarded by its own async mutex. The outer map
//! lock is only held long enough to look up or insert a slot, so disjoint
//! batches never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::types::{BatchId, ItemRef};

#[derive(Debug, Default)]
struct BatchSlot {
    items: Vec<ItemRef>,
    // Set by the drain that consumed this slot. Appends that raced the drain
    // and still hold a clone of the slot must go to a fresh one instead.
    sealed: bool,
}

type SharedSlot = Arc<AsyncMutex<BatchSlot>>;

#[derive(Debug, Default)]
pub struct BatchAccumulator {
    slots: Mutex<HashMap<BatchId, SharedSlot>>,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, batch_id: &BatchId) -> SharedSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(batch_id.clone()).or_default().clone()
    }

    /// Appends `item` to the buffer for `batch_id` and returns the buffer
    /// length observed right after the append. A return value of `1` means
    /// the caller started a new batch.
    pub async fn append(&self, batch_id: &BatchId, item: ItemRef) -> usize {
        loop {
            let slot = self.slot(batch_id);
            let mut guard = slot.lock().await;
            if guard.sealed {
                continue;
            }
            guard.items.push(item);
            return guard.items.len();
        }
    }

    /// Takes every buffered item for `batch_id` and forgets the batch.
    ///
    /// Returns an empty vector when nothing is buffered, including when the
    /// batch was already drained.
    pub async fn drain_and_remove(&self, batch_id: &BatchId) -> Vec<ItemRef> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get(batch_id) {
                Some(slot) => slot.clone(),
                None => return Vec::new(),
            }
        };

        let mut guard = slot.lock().await;
        guard.sealed = true;
        let items = std::mem::take(&mut guard.items);

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(batch_id)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            slots.remove(batch_id);
        }
        drop(slots);
        drop(guard);

        items
    }

    /// Number of batches currently being collected.
    pub fn open_batches(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
