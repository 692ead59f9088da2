// src/backend/models/notification.rs
use crate::models::common::{OrderId, Timestamp, UserId};
use candid::CandidType;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub message: String,
    pub created_at: Timestamp,
}
