// src/backend/storage/usage.rs
use crate::adapter::{Clock, Metering};
use crate::error::LockerError;
use crate::models::{OrderId, UsageEvent, UsageEventType};
use crate::storage::memory::{Manager, Memory, USAGE_LOG_DATA_MEM_ID, USAGE_LOG_INDEX_MEM_ID};
use crate::storage::storable::{init_error, Cbor};
use async_trait::async_trait;
use ic_stable_structures::StableLog;
use std::cell::RefCell;
use std::rc::Rc;

/// Append-only metering log.
pub struct StableUsageLog {
    log: RefCell<StableLog<Cbor<UsageEvent>, Memory, Memory>>,
    clock: Rc<dyn Clock>,
}

impl StableUsageLog {
    pub fn init(manager: &Manager, clock: Rc<dyn Clock>) -> Result<Self, LockerError> {
        let log = StableLog::init(
            manager.get(USAGE_LOG_INDEX_MEM_ID),
            manager.get(USAGE_LOG_DATA_MEM_ID),
        )
        .map_err(|e| init_error("usage log", e))?;
        Ok(Self {
            log: RefCell::new(log),
            clock,
        })
    }

    /// Returns one page of events in insertion order plus the total count.
    pub fn page(&self, offset: u64, limit: usize) -> (Vec<UsageEvent>, u64) {
        let log = self.log.borrow();
        let total = log.len();
        let events = (offset..total)
            .take(limit)
            .filter_map(|idx| log.get(idx).map(|c| c.0))
            .collect();
        (events, total)
    }
}

#[async_trait(?Send)]
impl Metering for StableUsageLog {
    async fn record_event(
        &self,
        order_id: OrderId,
        event_type: UsageEventType,
        value: u64,
    ) -> Result<(), LockerError> {
        let event = UsageEvent {
            order_id,
            event_type,
            value,
            recorded_at: self.clock.now(),
        };
        self.log
            .borrow_mut()
            .append(&Cbor(event))
            .map_err(|e| LockerError::StorageError(format!("Failed to append usage event: {:?}", e)))?;
        Ok(())
    }
}
