//! Process-lifetime map from chat identity to resolved roster row.
//!
//! Each identity owns a slot guarded by an async mutex. Resolution holds the
//! slot for its whole read-resolve-write-through sequence, so two concurrent
//! first contacts from one identity resolve and write through exactly once.
//! Slots of identities that never bound are released with their last claim.
//! Nothing is reloaded from the store on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{IdentityId, RowIndex};

type Slot = Arc<AsyncMutex<Option<RowIndex>>>;
type SlotMap = Arc<Mutex<HashMap<IdentityId, Slot>>>;

#[derive(Debug, Default)]
pub struct BindingCache {
    slots: SlotMap,
}

/// Exclusive hold on one identity's binding.
#[derive(Debug)]
pub struct BindingClaim {
    identity: IdentityId,
    slots: SlotMap,
    slot: Slot,
    guard: OwnedMutexGuard<Option<RowIndex>>,
}

// References held by the map, the claim, and its guard.
const IDLE_SLOT_REFS: usize = 3;

impl Drop for BindingClaim {
    fn drop(&mut self) {
        if self.guard.is_some() {
            return;
        }
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Any extra reference is a claimant waiting on this slot.
        let idle = Arc::strong_count(&self.slot) <= IDLE_SLOT_REFS;
        let owned = slots
            .get(&self.identity)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot));
        if idle && owned {
            slots.remove(&self.identity);
        }
    }
}

impl BindingClaim {
    pub fn identity(&self) -> IdentityId {
        self.identity
    }

    pub fn row(&self) -> Option<RowIndex> {
        *self.guard
    }

    pub fn record(&mut self, row: RowIndex) {
        *self.guard = Some(row);
    }
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_slot(&self, identity: IdentityId) -> Option<Slot> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&identity)
            .cloned()
    }

    fn slot(&self, identity: IdentityId) -> Slot {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(identity)
            .or_default()
            .clone()
    }

    /// Cached row for `identity`. Waits for an in-flight resolution of the
    /// same identity but never touches the store.
    pub async fn bind(&self, identity: IdentityId) -> Option<RowIndex> {
        let slot = self.existing_slot(identity)?;
        let row = *slot.lock().await;
        row
    }

    /// Inserts or replaces a binding.
    pub async fn record(&self, identity: IdentityId, row: RowIndex) {
        self.claim(identity).await.record(row);
    }

    /// Locks the identity's slot until the returned claim is dropped.
    pub async fn claim(&self, identity: IdentityId) -> BindingClaim {
        let slot = self.slot(identity);
        let guard = slot.clone().lock_owned().await;
        BindingClaim {
            identity,
            slots: self.slots.clone(),
            slot,
            guard,
        }
    }

    /// Number of identities with a recorded row.
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut bound = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                bound += 1;
            }
        }
        bound
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
