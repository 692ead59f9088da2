// src/backend/models/order.rs
use crate::models::common::{LocationId, OrderId, OrderStage, Timestamp, UserId};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// A customer order and its lifecycle timestamps.
///
/// `picked_up_at` is only ever set together with `delivered_date`, is never
/// earlier than it, and never changes once set.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub vendor_reference: String,
    pub customer_id: UserId,
    pub location_id: LocationId,
    pub created_at: Timestamp,
    pub shipped_at: Option<Timestamp>,
    pub delivered_date: Option<Timestamp>, // Set by warehouse intake
    pub processed_at: Option<Timestamp>,   // Internal staging complete
    pub picked_up_at: Option<Timestamp>,
    pub collected_by: Option<UserId>,
}

impl Order {
    pub fn stage(&self) -> OrderStage {
        if self.picked_up_at.is_some() {
            OrderStage::PickedUp
        } else if self.delivered_date.is_some() {
            OrderStage::Delivered
        } else if self.shipped_at.is_some() {
            OrderStage::Shipped
        } else {
            OrderStage::Ordered
        }
    }

    pub fn is_ready_for_pickup(&self) -> bool {
        self.stage() == OrderStage::Delivered
    }
}

/// Data needed to place a new order in the ledger.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug)]
pub struct NewOrder {
    pub vendor_reference: String,
    pub customer_id: UserId,
    pub location_id: LocationId,
}

/// Customer-facing summary of a package waiting at a locker.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ReadyForPickup {
    pub order_id: OrderId,
    pub vendor_reference: String,
    pub location_id: LocationId,
    pub delivered_date: Timestamp,
}

impl ReadyForPickup {
    pub fn from_order(order: &Order) -> Option<Self> {
        if !order.is_ready_for_pickup() {
            return None;
        }
        Some(Self {
            order_id: order.order_id,
            vendor_reference: order.vendor_reference.clone(),
            location_id: order.location_id,
            delivered_date: order.delivered_date?,
        })
    }
}
