// src/backend/storage/notifications.rs
use crate::adapter::{Clock, Notifier};
use crate::error::LockerError;
use crate::models::{Notification, OrderId, UserId};
use crate::storage::memory::{Manager, Memory, NOTIFICATIONS_MEM_ID};
use crate::storage::storable::Cbor;
use async_trait::async_trait;
use ic_stable_structures::StableBTreeMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Oldest entries are dropped once a user's inbox holds this many.
pub const INBOX_CAPACITY: usize = 100;

/// Per-user notification inbox, the in-canister notification channel.
pub struct StableNotificationInbox {
    inboxes: RefCell<StableBTreeMap<UserId, Cbor<Vec<Notification>>, Memory>>,
    clock: Rc<dyn Clock>,
}

impl StableNotificationInbox {
    pub fn init(manager: &Manager, clock: Rc<dyn Clock>) -> Self {
        Self {
            inboxes: RefCell::new(StableBTreeMap::init(manager.get(NOTIFICATIONS_MEM_ID))),
            clock,
        }
    }

    /// Newest first.
    pub fn inbox(&self, user_id: UserId) -> Vec<Notification> {
        let mut entries = self
            .inboxes
            .borrow()
            .get(&user_id)
            .map(|c| c.0)
            .unwrap_or_default();
        entries.reverse();
        entries
    }
}

#[async_trait(?Send)]
impl Notifier for StableNotificationInbox {
    async fn notify(&self, user_id: UserId, order_id: Option<OrderId>, message: String) -> Result<(), LockerError> {
        let mut inboxes = self.inboxes.borrow_mut();
        let mut entries = inboxes.get(&user_id).map(|c| c.0).unwrap_or_default();
        entries.push(Notification {
            user_id,
            order_id,
            message,
            created_at: self.clock.now(),
        });
        if entries.len() > INBOX_CAPACITY {
            let excess = entries.len() - INBOX_CAPACITY;
            entries.drain(..excess);
        }
        inboxes.insert(user_id, Cbor(entries));
        Ok(())
    }
}
