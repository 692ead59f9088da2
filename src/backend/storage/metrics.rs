// src/backend/storage/metrics.rs
use crate::error::LockerError;
use crate::metrics::LockerMetrics;
use crate::storage::memory::{get_memory, Memory, METRICS_MEM_ID};
use crate::storage::storable::Cbor;
use ic_stable_structures::StableCell;
use std::cell::RefCell;

type StorableLockerMetrics = Cbor<LockerMetrics>;

thread_local! {
    /// Global locker metrics
    static METRICS_CELL: RefCell<StableCell<StorableLockerMetrics, Memory>> = RefCell::new(
        StableCell::init(get_memory(METRICS_MEM_ID), Cbor(LockerMetrics::default()))
            .expect("Failed to initialize metrics stable cell")
    );
}

pub fn get_metrics() -> LockerMetrics {
    METRICS_CELL.with(|cell| cell.borrow().get().0.clone())
}

/// Applies `update_fn` to the stored counters.
pub fn update_metrics<F>(update_fn: F) -> Result<(), LockerError>
where
    F: FnOnce(&mut LockerMetrics),
{
    METRICS_CELL.with(|cell| {
        let mut metrics = cell.borrow().get().0.clone();
        update_fn(&mut metrics);
        cell.borrow_mut()
            .set(Cbor(metrics))
            .map_err(|e| LockerError::StorageError(format!("Failed to update metrics: {:?}", e)))?;
        Ok(())
    })
}
