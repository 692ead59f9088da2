// src/backend/adapter/mod.rs
//! Narrow contracts to the collaborators around the pickup core.
//!
//! Canister execution is single-threaded, so the traits are `?Send` and the
//! services share implementations through `Rc`. Every method that touches a
//! store is async: the core must not assume a collaborator answers without
//! yielding.

use crate::error::LockerError;
use crate::models::{
    InsertOutcome, NewOrder, Order, OrderId, PendingInvitation, PickupEffectRecord,
    PresentedIdentity, ShareGrant, Timestamp, TrustedContactRelationship, UsageEventType, UserId,
};
use async_trait::async_trait;

/// Durable order records.
#[async_trait(?Send)]
pub trait OrderLedger {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, LockerError>;

    async fn place_order(&self, order: NewOrder, at: Timestamp) -> Result<Order, LockerError>;

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, LockerError>;

    async fn mark_shipped(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError>;

    async fn mark_delivered(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError>;

    async fn mark_processed(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError>;

    /// Sets `picked_up_at` only if it is still null and the order has been
    /// delivered. Returns the number of rows changed (0 or 1).
    async fn conditional_mark_picked_up(
        &self,
        order_id: OrderId,
        at: Timestamp,
        collected_by: UserId,
    ) -> Result<u64, LockerError>;
}

/// Relationship, grant and invitation rows of the delegation graph.
#[async_trait(?Send)]
pub trait DelegationStore {
    async fn relationship(
        &self,
        account_holder_id: UserId,
        trusted_contact_id: UserId,
    ) -> Result<Option<TrustedContactRelationship>, LockerError>;

    /// Inserts unless a row for the same ordered pair exists.
    async fn insert_relationship_if_absent(
        &self,
        relationship: TrustedContactRelationship,
    ) -> Result<InsertOutcome<TrustedContactRelationship>, LockerError>;

    async fn save_relationship(&self, relationship: &TrustedContactRelationship) -> Result<(), LockerError>;

    async fn relationships_for_holder(
        &self,
        account_holder_id: UserId,
    ) -> Result<Vec<TrustedContactRelationship>, LockerError>;

    async fn relationships_for_contact(
        &self,
        trusted_contact_id: UserId,
    ) -> Result<Vec<TrustedContactRelationship>, LockerError>;

    async fn share_grant(
        &self,
        order_id: OrderId,
        shared_with_id: UserId,
    ) -> Result<Option<ShareGrant>, LockerError>;

    async fn save_share_grant(&self, grant: &ShareGrant) -> Result<(), LockerError>;

    async fn grants_for_order(&self, order_id: OrderId) -> Result<Vec<ShareGrant>, LockerError>;

    async fn grants_for_contact(&self, shared_with_id: UserId) -> Result<Vec<ShareGrant>, LockerError>;

    /// Queues an invitation; returns the existing unprocessed one for the same
    /// email and holder instead of adding a duplicate.
    async fn queue_invitation(
        &self,
        email: &str,
        account_holder_id: UserId,
        at: Timestamp,
    ) -> Result<PendingInvitation, LockerError>;

    async fn unprocessed_invitations(&self, email: &str) -> Result<Vec<PendingInvitation>, LockerError>;

    /// Flags the invitation processed. Returns false if it already was.
    async fn mark_invitation_processed(
        &self,
        invitation_id: u64,
        at: Timestamp,
    ) -> Result<bool, LockerError>;

    async fn purge_processed_invitations(&self, processed_before: Timestamp) -> Result<u64, LockerError>;
}

/// Identity lookups owned by the account system.
#[async_trait(?Send)]
pub trait IdentityProvider {
    async fn user_by_email(&self, email: &str) -> Result<Option<UserId>, LockerError>;

    async fn presented_identity(&self, user_id: UserId) -> Result<Option<PresentedIdentity>, LockerError>;
}

#[async_trait(?Send)]
pub trait Notifier {
    async fn notify(&self, user_id: UserId, order_id: Option<OrderId>, message: String) -> Result<(), LockerError>;
}

#[async_trait(?Send)]
pub trait Metering {
    async fn record_event(
        &self,
        order_id: OrderId,
        event_type: UsageEventType,
        value: u64,
    ) -> Result<(), LockerError>;
}

/// Cached "ready for pickup" state shown on customer screens.
#[async_trait(?Send)]
pub trait PickupCache {
    async fn invalidate(&self, customer_id: UserId) -> Result<(), LockerError>;
}

/// Per-order record of which post-pickup effects have been delivered.
#[async_trait(?Send)]
pub trait EffectJournal {
    async fn load(&self, order_id: OrderId) -> Result<Option<PickupEffectRecord>, LockerError>;

    async fn store(&self, order_id: OrderId, record: &PickupEffectRecord) -> Result<(), LockerError>;

    async fn incomplete(&self, limit: usize) -> Result<Vec<OrderId>, LockerError>;
}

/// Source of the current time, in nanoseconds since epoch.
pub trait Clock {
    fn now(&self) -> Timestamp;
}
