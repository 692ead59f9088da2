// src/backend/storage/ready_cache.rs
use crate::adapter::PickupCache;
use crate::error::LockerError;
use crate::models::{ReadyForPickup, UserId};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;

/// Heap cache of each customer's ready-for-pickup list. Cleared on upgrade.
#[derive(Default)]
pub struct ReadyForPickupCache {
    entries: RefCell<HashMap<UserId, Vec<ReadyForPickup>>>,
}

impl ReadyForPickupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, customer_id: UserId) -> Option<Vec<ReadyForPickup>> {
        self.entries.borrow().get(&customer_id).cloned()
    }

    pub fn fill(&self, customer_id: UserId, ready: Vec<ReadyForPickup>) {
        self.entries.borrow_mut().insert(customer_id, ready);
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let dropped = entries.len();
        entries.clear();
        dropped
    }
}

#[async_trait(?Send)]
impl PickupCache for ReadyForPickupCache {
    async fn invalidate(&self, customer_id: UserId) -> Result<(), LockerError> {
        self.entries.borrow_mut().remove(&customer_id);
        Ok(())
    }
}
