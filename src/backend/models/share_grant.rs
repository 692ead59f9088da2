// src/backend/models/share_grant.rs
use crate::models::common::{OrderId, RelationshipStatus, Timestamp, UserId};
use crate::models::relationship::TrustedContactRelationship;
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Permission for a trusted contact to collect one order.
///
/// Rows are soft-removed (`removed_at`) and never deleted, so the sharing
/// history of an order survives revocations.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ShareGrant {
    pub order_id: OrderId,
    pub shared_with_id: UserId,
    pub account_holder_id: UserId,
    pub relationship_generation: u32,
    pub created_at: Timestamp,
    pub removed_at: Option<Timestamp>,
}

impl ShareGrant {
    /// Whether this grant authorizes collection under the given relationship.
    ///
    /// Checked at read time: revoking the relationship, or re-accepting it
    /// later under a new generation, makes the grant inert without touching it.
    pub fn is_active_under(&self, relationship: &TrustedContactRelationship) -> bool {
        self.removed_at.is_none()
            && relationship.status == RelationshipStatus::Accepted
            && relationship.account_holder_id == self.account_holder_id
            && relationship.trusted_contact_id == self.shared_with_id
            && relationship.generation == self.relationship_generation
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum ShareToggle {
    Granted,
    AlreadyGranted,
    Removed,
    NotGranted,
}
