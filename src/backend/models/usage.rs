// src/backend/models/usage.rs
use crate::models::common::{OrderId, Timestamp};
use candid::CandidType;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum UsageEventType {
    PackagePickedUp,
}

/// One metering record, appended after a committed pickup.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UsageEvent {
    pub order_id: OrderId,
    pub event_type: UsageEventType,
    pub value: u64,
    pub recorded_at: Timestamp,
}

/// Delivery state of the post-pickup side effects for one order.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct PickupEffectRecord {
    pub customer_notified: bool,
    pub collector_notified: bool,
    pub usage_recorded: bool,
    pub cache_invalidated: bool,
    pub attempts: u32,
    pub last_attempt_at: Option<Timestamp>,
}

impl PickupEffectRecord {
    pub fn is_complete(&self) -> bool {
        self.customer_notified && self.collector_notified && self.usage_recorded && self.cache_invalidated
    }
}
