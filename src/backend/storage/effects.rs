// src/backend/storage/effects.rs
use crate::adapter::EffectJournal;
use crate::error::LockerError;
use crate::models::{OrderId, PickupEffectRecord};
use crate::storage::memory::{Manager, Memory, EFFECT_JOURNAL_MEM_ID};
use crate::storage::storable::Cbor;
use async_trait::async_trait;
use ic_stable_structures::StableBTreeMap;
use std::cell::RefCell;

/// Which post-pickup effects have been delivered, per order.
pub struct StableEffectJournal {
    records: RefCell<StableBTreeMap<OrderId, Cbor<PickupEffectRecord>, Memory>>,
}

impl StableEffectJournal {
    pub fn init(manager: &Manager) -> Self {
        Self {
            records: RefCell::new(StableBTreeMap::init(manager.get(EFFECT_JOURNAL_MEM_ID))),
        }
    }
}

#[async_trait(?Send)]
impl EffectJournal for StableEffectJournal {
    async fn load(&self, order_id: OrderId) -> Result<Option<PickupEffectRecord>, LockerError> {
        Ok(self.records.borrow().get(&order_id).map(|c| c.0))
    }

    async fn store(&self, order_id: OrderId, record: &PickupEffectRecord) -> Result<(), LockerError> {
        self.records
            .borrow_mut()
            .insert(order_id, Cbor(record.clone()));
        Ok(())
    }

    async fn incomplete(&self, limit: usize) -> Result<Vec<OrderId>, LockerError> {
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|(_, record)| !record.0.is_complete())
            .map(|(order_id, _)| order_id)
            .take(limit)
            .collect())
    }
}
