// src/backend/storage/orders.rs
use crate::adapter::OrderLedger;
use crate::error::LockerError;
use crate::models::{NewOrder, Order, OrderId, Timestamp, UserId};
use crate::storage::memory::{
    Manager, Memory, ORDERS_BY_CUSTOMER_MEM_ID, ORDERS_MEM_ID, ORDER_COUNTER_MEM_ID,
};
use crate::storage::storable::{init_error, Cbor};
use async_trait::async_trait;
use ic_stable_structures::{StableBTreeMap, StableCell};
use std::cell::RefCell;

type StorableOrder = Cbor<Order>;

/// Order ledger in stable memory.
///
/// Every mutation runs to completion without yielding, so a conditional
/// update is atomic with respect to other messages executing on the canister.
pub struct StableOrderLedger {
    /// Key = OrderId
    orders: RefCell<StableBTreeMap<OrderId, StorableOrder, Memory>>,
    /// Secondary index: (CustomerId, OrderId) -> created_at
    by_customer: RefCell<StableBTreeMap<(UserId, OrderId), Timestamp, Memory>>,
    /// Next order id to hand out
    next_id: RefCell<StableCell<u64, Memory>>,
}

impl StableOrderLedger {
    pub fn init(manager: &Manager) -> Result<Self, LockerError> {
        let next_id = StableCell::init(manager.get(ORDER_COUNTER_MEM_ID), 1)
            .map_err(|e| init_error("order counter", e))?;
        Ok(Self {
            orders: RefCell::new(StableBTreeMap::init(manager.get(ORDERS_MEM_ID))),
            by_customer: RefCell::new(StableBTreeMap::init(manager.get(ORDERS_BY_CUSTOMER_MEM_ID))),
            next_id: RefCell::new(next_id),
        })
    }

    fn allocate_id(&self) -> Result<OrderId, LockerError> {
        let mut cell = self.next_id.borrow_mut();
        let current = *cell.get();
        let next = current
            .checked_add(1)
            .ok_or_else(|| LockerError::InternalError("Order counter overflow".to_string()))?;
        cell.set(next)
            .map_err(|e| LockerError::StorageError(format!("Failed to update order counter: {:?}", e)))?;
        Ok(current)
    }

    /// Applies `change` to the stored order and writes it back if it reports
    /// a modification. Returns affected rows.
    fn update_where<F>(&self, order_id: OrderId, change: F) -> u64
    where
        F: FnOnce(&mut Order) -> bool,
    {
        let mut orders = self.orders.borrow_mut();
        let Some(Cbor(mut order)) = orders.get(&order_id) else {
            return 0;
        };
        if !change(&mut order) {
            return 0;
        }
        orders.insert(order_id, Cbor(order));
        1
    }
}

#[async_trait(?Send)]
impl OrderLedger for StableOrderLedger {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, LockerError> {
        Ok(self.orders.borrow().get(&order_id).map(|c| c.0))
    }

    async fn place_order(&self, order: NewOrder, at: Timestamp) -> Result<Order, LockerError> {
        let order_id = self.allocate_id()?;
        let order = Order {
            order_id,
            vendor_reference: order.vendor_reference,
            customer_id: order.customer_id,
            location_id: order.location_id,
            created_at: at,
            shipped_at: None,
            delivered_date: None,
            processed_at: None,
            picked_up_at: None,
            collected_by: None,
        };
        self.orders.borrow_mut().insert(order_id, Cbor(order.clone()));
        self.by_customer
            .borrow_mut()
            .insert((order.customer_id, order_id), at);
        Ok(order)
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, LockerError> {
        let index = self.by_customer.borrow();
        let orders = self.orders.borrow();
        Ok(index
            .range((customer_id, OrderId::MIN)..=(customer_id, OrderId::MAX))
            .filter_map(|((_, order_id), _)| orders.get(&order_id).map(|c| c.0))
            .collect())
    }

    async fn mark_shipped(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
        Ok(self.update_where(order_id, |order| {
            if order.shipped_at.is_some() || order.delivered_date.is_some() {
                return false;
            }
            order.shipped_at = Some(at);
            true
        }))
    }

    async fn mark_delivered(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
        Ok(self.update_where(order_id, |order| {
            if order.delivered_date.is_some() {
                return false;
            }
            order.delivered_date = Some(at);
            true
        }))
    }

    async fn mark_processed(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
        Ok(self.update_where(order_id, |order| {
            if order.processed_at.is_some() || order.delivered_date.is_none() {
                return false;
            }
            order.processed_at = Some(at);
            true
        }))
    }

    async fn conditional_mark_picked_up(
        &self,
        order_id: OrderId,
        at: Timestamp,
        collected_by: UserId,
    ) -> Result<u64, LockerError> {
        Ok(self.update_where(order_id, |order| match (order.picked_up_at, order.delivered_date) {
            (None, Some(delivered)) => {
                order.picked_up_at = Some(at.max(delivered));
                order.collected_by = Some(collected_by);
                true
            }
            _ => false,
        }))
    }
}
