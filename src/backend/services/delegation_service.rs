// src/backend/services/delegation_service.rs
//! Trusted-contact relationships and per-order share grants.
//!
//! Revocation never touches grant rows. Whether a grant still counts is
//! decided when it is read, against the relationship's current status and
//! generation.

use crate::adapter::{Clock, DelegationStore, IdentityProvider, OrderLedger};
use crate::error::LockerError;
use crate::models::{
    normalize_email, InsertOutcome, InvitationOutcome, Order, OrderId, RelationshipStatus,
    ShareGrant, ShareToggle, Timestamp, TrustedContactRelationship, UserId,
};
use std::rc::Rc;
use validator::Validate;

#[derive(Validate)]
struct InviteeEmail {
    #[validate(email, length(max = 254))]
    email: String,
}

pub struct DelegationService {
    store: Rc<dyn DelegationStore>,
    ledger: Rc<dyn OrderLedger>,
    identity: Rc<dyn IdentityProvider>,
    clock: Rc<dyn Clock>,
}

impl DelegationService {
    pub fn new(
        store: Rc<dyn DelegationStore>,
        ledger: Rc<dyn OrderLedger>,
        identity: Rc<dyn IdentityProvider>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            identity,
            clock,
        }
    }

    /// Invites `email` to become a trusted contact of `account_holder_id`.
    ///
    /// An unknown email queues a pending invitation that is converted when
    /// the account is created.
    pub async fn invite(&self, account_holder_id: UserId, email: &str) -> Result<InvitationOutcome, LockerError> {
        let email = normalize_email(email);
        InviteeEmail { email: email.clone() }.validate()?;
        let now = self.clock.now();

        let Some(contact_id) = self.identity.user_by_email(&email).await? else {
            let invitation = self.store.queue_invitation(&email, account_holder_id, now).await?;
            log_info!(
                "DELEGATION: queued invitation {} from holder {}",
                invitation.invitation_id,
                account_holder_id
            );
            return Ok(InvitationOutcome::InvitationQueued(invitation));
        };
        if contact_id == account_holder_id {
            return Err(LockerError::InvalidInput(
                "You cannot invite yourself as a trusted contact".to_string(),
            ));
        }

        if let Some(mut existing) = self.store.relationship(account_holder_id, contact_id).await? {
            if existing.status != RelationshipStatus::Revoked {
                return Ok(InvitationOutcome::AlreadyInvited(existing));
            }
            existing.status = RelationshipStatus::Pending;
            existing.invited_at = now;
            existing.accepted_at = None;
            existing.updated_at = now;
            self.store.save_relationship(&existing).await?;
            log_info!(
                "DELEGATION: holder {} re-invited contact {}",
                account_holder_id,
                contact_id
            );
            return Ok(InvitationOutcome::RelationshipCreated(existing));
        }

        let invited = TrustedContactRelationship::invited(account_holder_id, contact_id, now);
        match self.store.insert_relationship_if_absent(invited).await? {
            InsertOutcome::Inserted(rel) => {
                log_info!(
                    "DELEGATION: holder {} invited contact {}",
                    account_holder_id,
                    contact_id
                );
                Ok(InvitationOutcome::RelationshipCreated(rel))
            }
            InsertOutcome::Conflict(existing) => Ok(InvitationOutcome::AlreadyInvited(existing)),
        }
    }

    /// Converts every unprocessed invitation for `email` into a pending
    /// relationship for the new account. Returns how many relationships this
    /// call created; repeated or concurrent calls create none twice.
    pub async fn handle_account_created(&self, user_id: UserId, email: &str) -> Result<u32, LockerError> {
        let email = normalize_email(email);
        let now = self.clock.now();
        let mut created = 0u32;

        for invitation in self.store.unprocessed_invitations(&email).await? {
            if invitation.account_holder_id != user_id {
                let rel = TrustedContactRelationship::invited(invitation.account_holder_id, user_id, now);
                match self.store.insert_relationship_if_absent(rel).await? {
                    InsertOutcome::Inserted(_) => created += 1,
                    InsertOutcome::Conflict(_) => log_info!(
                        "DELEGATION: invitation {} already converted for holder {}",
                        invitation.invitation_id,
                        invitation.account_holder_id
                    ),
                }
            }
            self.store
                .mark_invitation_processed(invitation.invitation_id, now)
                .await?;
        }

        if created > 0 {
            log_info!(
                "DELEGATION: converted {} invitation(s) for new user {}",
                created,
                user_id
            );
        }
        Ok(created)
    }

    /// Only the invited contact can accept.
    pub async fn accept(
        &self,
        account_holder_id: UserId,
        caller: UserId,
    ) -> Result<TrustedContactRelationship, LockerError> {
        let mut rel = self
            .store
            .relationship(account_holder_id, caller)
            .await?
            .ok_or_else(|| LockerError::NotFound("No invitation from this account holder".to_string()))?;

        match rel.status {
            RelationshipStatus::Accepted => Ok(rel),
            RelationshipStatus::Revoked => Err(LockerError::InvalidState(
                "Relationship was revoked; ask for a new invitation".to_string(),
            )),
            RelationshipStatus::Pending => {
                let now = self.clock.now();
                rel.status = RelationshipStatus::Accepted;
                rel.generation = rel.generation.saturating_add(1);
                rel.accepted_at = Some(now);
                rel.revoked_at = None;
                rel.revoked_by = None;
                rel.updated_at = now;
                self.store.save_relationship(&rel).await?;
                log_info!(
                    "DELEGATION: contact {} accepted holder {} (generation {})",
                    caller,
                    account_holder_id,
                    rel.generation
                );
                Ok(rel)
            }
        }
    }

    /// Either party can revoke. Grants become inert without being rewritten.
    pub async fn revoke(
        &self,
        account_holder_id: UserId,
        trusted_contact_id: UserId,
        caller: UserId,
    ) -> Result<TrustedContactRelationship, LockerError> {
        let mut rel = self
            .store
            .relationship(account_holder_id, trusted_contact_id)
            .await?
            .ok_or_else(|| LockerError::NotFound("Relationship not found".to_string()))?;
        if !rel.involves(caller) {
            return Err(LockerError::NotAuthorized(
                "Only a party to the relationship can revoke it".to_string(),
            ));
        }
        if rel.status == RelationshipStatus::Revoked {
            return Ok(rel);
        }

        let now = self.clock.now();
        rel.status = RelationshipStatus::Revoked;
        rel.revoked_at = Some(now);
        rel.revoked_by = Some(caller);
        rel.updated_at = now;
        self.store.save_relationship(&rel).await?;
        log_info!(
            "DELEGATION: relationship {}->{} revoked by {}",
            account_holder_id,
            trusted_contact_id,
            caller
        );
        Ok(rel)
    }

    /// Turns sharing of one order with one accepted contact on or off.
    pub async fn set_sharing(
        &self,
        caller: UserId,
        order_id: OrderId,
        trusted_contact_id: UserId,
        enabled: bool,
    ) -> Result<ShareToggle, LockerError> {
        let order = self.owned_order(caller, order_id).await?;
        if trusted_contact_id == caller {
            return Err(LockerError::InvalidInput(
                "An order cannot be shared with its own customer".to_string(),
            ));
        }
        let existing = self.store.share_grant(order_id, trusted_contact_id).await?;
        let now = self.clock.now();

        let toggle = if enabled {
            let rel = self
                .store
                .relationship(order.customer_id, trusted_contact_id)
                .await?
                .filter(|rel| rel.status == RelationshipStatus::Accepted)
                .ok_or_else(|| {
                    LockerError::InvalidState(
                        "Sharing requires an accepted trusted-contact relationship".to_string(),
                    )
                })?;
            if existing.as_ref().is_some_and(|grant| grant.is_active_under(&rel)) {
                ShareToggle::AlreadyGranted
            } else {
                let grant = ShareGrant {
                    order_id,
                    shared_with_id: trusted_contact_id,
                    account_holder_id: order.customer_id,
                    relationship_generation: rel.generation,
                    created_at: now,
                    removed_at: None,
                };
                self.store.save_share_grant(&grant).await?;
                ShareToggle::Granted
            }
        } else {
            match existing {
                Some(mut grant) if grant.removed_at.is_none() => {
                    grant.removed_at = Some(now);
                    self.store.save_share_grant(&grant).await?;
                    ShareToggle::Removed
                }
                _ => ShareToggle::NotGranted,
            }
        };

        log_info!(
            "DELEGATION: order {} sharing with {} -> {:?}",
            order_id,
            trusted_contact_id,
            toggle
        );
        Ok(toggle)
    }

    /// The grant letting `subject_id` collect `order`, if it is active now.
    pub async fn active_grant(&self, order: &Order, subject_id: UserId) -> Result<Option<ShareGrant>, LockerError> {
        let Some(grant) = self.store.share_grant(order.order_id, subject_id).await? else {
            return Ok(None);
        };
        let Some(rel) = self.store.relationship(order.customer_id, subject_id).await? else {
            return Ok(None);
        };
        Ok(grant.is_active_under(&rel).then_some(grant))
    }

    pub async fn contacts_of(&self, account_holder_id: UserId) -> Result<Vec<TrustedContactRelationship>, LockerError> {
        self.store.relationships_for_holder(account_holder_id).await
    }

    pub async fn holders_trusting(
        &self,
        trusted_contact_id: UserId,
    ) -> Result<Vec<TrustedContactRelationship>, LockerError> {
        self.store.relationships_for_contact(trusted_contact_id).await
    }

    /// Active grants on an order, visible to its customer only.
    pub async fn shares_for_order(&self, caller: UserId, order_id: OrderId) -> Result<Vec<ShareGrant>, LockerError> {
        let order = self.owned_order(caller, order_id).await?;
        let mut active = Vec::new();
        for grant in self.store.grants_for_order(order_id).await? {
            if let Some(rel) = self.store.relationship(order.customer_id, grant.shared_with_id).await? {
                if grant.is_active_under(&rel) {
                    active.push(grant);
                }
            }
        }
        Ok(active)
    }

    /// Orders the contact may currently collect on someone else's behalf.
    pub async fn orders_shared_with(&self, trusted_contact_id: UserId) -> Result<Vec<Order>, LockerError> {
        let mut orders = Vec::new();
        for grant in self.store.grants_for_contact(trusted_contact_id).await? {
            let Some(order) = self.ledger.find_order(grant.order_id).await? else {
                continue;
            };
            if self.active_grant(&order, trusted_contact_id).await?.is_some() {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    pub async fn purge_processed_invitations(&self, older_than: Timestamp) -> Result<u64, LockerError> {
        let purged = self.store.purge_processed_invitations(older_than).await?;
        if purged > 0 {
            log_info!("DELEGATION: purged {} processed invitation(s)", purged);
        }
        Ok(purged)
    }

    async fn owned_order(&self, caller: UserId, order_id: OrderId) -> Result<Order, LockerError> {
        let order = self
            .ledger
            .find_order(order_id)
            .await?
            .ok_or(LockerError::OrderNotFound(order_id))?;
        if order.customer_id != caller {
            return Err(LockerError::NotAuthorized(
                "Only the order's customer can manage its sharing".to_string(),
            ));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{TestWorld, ALICE, BOB, CAROL};
    use futures::executor::block_on;
    use futures::future::join_all;

    #[test]
    fn invite_known_email_creates_pending_relationship() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let bob = world.customer(BOB);

        let outcome = block_on(world.services.delegation.invite(alice, " Bob@Example.com ")).unwrap();
        let InvitationOutcome::RelationshipCreated(rel) = outcome else {
            panic!("expected a new relationship, got {:?}", outcome);
        };
        assert_eq!(rel.key(), (alice, bob));
        assert_eq!(rel.status, RelationshipStatus::Pending);

        let again = block_on(world.services.delegation.invite(alice, "bob@example.com")).unwrap();
        assert!(matches!(again, InvitationOutcome::AlreadyInvited(_)));
        assert_eq!(block_on(world.services.delegation.contacts_of(alice)).unwrap().len(), 1);
    }

    #[test]
    fn invite_rejects_self_and_invalid_email() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        assert!(matches!(
            block_on(world.services.delegation.invite(alice, "alice@example.com")),
            Err(LockerError::InvalidInput(_))
        ));
        assert!(matches!(
            block_on(world.services.delegation.invite(alice, "not-an-email")),
            Err(LockerError::InvalidInput(_))
        ));
    }

    #[test]
    fn invitation_before_signup_converts_exactly_once() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let outcome = block_on(world.services.delegation.invite(alice, "bob@example.com")).unwrap();
        assert!(matches!(outcome, InvitationOutcome::InvitationQueued(_)));

        let bob = world.customer(BOB);
        let first = block_on(world.services.delegation.handle_account_created(bob, "bob@example.com")).unwrap();
        let second = block_on(world.services.delegation.handle_account_created(bob, "bob@example.com")).unwrap();
        assert_eq!((first, second), (1, 0));
        assert_eq!(block_on(world.services.delegation.holders_trusting(bob)).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_invitation_processing_swallows_duplicate_inserts() {
        let world = TestWorld::with_yielding_reads();
        let alice = world.customer(ALICE);
        block_on(world.services.delegation.invite(alice, "bob@example.com")).unwrap();
        let bob = world.customer(BOB);

        let delegation = &world.services.delegation;
        let results = block_on(join_all(
            (0..3).map(|_| delegation.handle_account_created(bob, "bob@example.com")),
        ));
        let created: u32 = results.into_iter().map(|r| r.unwrap()).sum();
        assert_eq!(created, 1);
        assert_eq!(block_on(delegation.contacts_of(alice)).unwrap().len(), 1);
    }

    #[test]
    fn only_the_invitee_accepts_and_revoked_pairs_cannot_be_accepted() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let bob = world.customer(BOB);
        block_on(world.services.delegation.invite(alice, "bob@example.com")).unwrap();

        assert!(matches!(
            block_on(world.services.delegation.accept(bob, alice)),
            Err(LockerError::NotFound(_))
        ));
        let accepted = block_on(world.services.delegation.accept(alice, bob)).unwrap();
        assert_eq!(accepted.status, RelationshipStatus::Accepted);
        assert_eq!(accepted.generation, 1);
        let again = block_on(world.services.delegation.accept(alice, bob)).unwrap();
        assert_eq!(again.generation, 1);

        block_on(world.services.delegation.revoke(alice, bob, bob)).unwrap();
        assert!(matches!(
            block_on(world.services.delegation.accept(alice, bob)),
            Err(LockerError::InvalidState(_))
        ));
    }

    #[test]
    fn revoke_requires_a_party_and_is_idempotent() {
        let world = TestWorld::new();
        let (alice, bob) = world.accepted_pair();
        let stranger = world.customer(CAROL);

        assert!(matches!(
            block_on(world.services.delegation.revoke(alice, bob, stranger)),
            Err(LockerError::NotAuthorized(_))
        ));
        let first = block_on(world.services.delegation.revoke(alice, bob, alice)).unwrap();
        let second = block_on(world.services.delegation.revoke(alice, bob, bob)).unwrap();
        assert_eq!(first.revoked_at, second.revoked_at);
        assert_eq!(second.revoked_by, Some(alice));
    }

    #[test]
    fn sharing_toggles_are_idempotent_and_owner_only() {
        let world = TestWorld::new();
        let (alice, bob) = world.accepted_pair();
        let order = world.delivered_order(alice);
        let delegation = &world.services.delegation;

        assert_eq!(block_on(delegation.set_sharing(alice, order, bob, true)).unwrap(), ShareToggle::Granted);
        assert_eq!(
            block_on(delegation.set_sharing(alice, order, bob, true)).unwrap(),
            ShareToggle::AlreadyGranted
        );
        assert!(matches!(
            block_on(delegation.set_sharing(bob, order, alice, true)),
            Err(LockerError::NotAuthorized(_))
        ));
        assert_eq!(block_on(delegation.shares_for_order(alice, order)).unwrap().len(), 1);

        assert_eq!(block_on(delegation.set_sharing(alice, order, bob, false)).unwrap(), ShareToggle::Removed);
        assert_eq!(
            block_on(delegation.set_sharing(alice, order, bob, false)).unwrap(),
            ShareToggle::NotGranted
        );
        assert!(block_on(delegation.shares_for_order(alice, order)).unwrap().is_empty());
        assert!(block_on(delegation.orders_shared_with(bob)).unwrap().is_empty());
    }

    #[test]
    fn sharing_requires_an_accepted_relationship() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let bob = world.customer(BOB);
        block_on(world.services.delegation.invite(alice, "bob@example.com")).unwrap();
        let order = world.delivered_order(alice);

        assert!(matches!(
            block_on(world.services.delegation.set_sharing(alice, order, bob, true)),
            Err(LockerError::InvalidState(_))
        ));
        assert_eq!(
            block_on(world.services.delegation.set_sharing(alice, 999, bob, true)),
            Err(LockerError::OrderNotFound(999))
        );
    }

    #[test]
    fn revocation_makes_grants_inert_and_reacceptance_does_not_revive_them() {
        let world = TestWorld::new();
        let (alice, bob) = world.accepted_pair();
        let order_id = world.delivered_order(alice);
        let delegation = &world.services.delegation;
        block_on(delegation.set_sharing(alice, order_id, bob, true)).unwrap();
        let order = world.order(order_id);
        assert!(block_on(delegation.active_grant(&order, bob)).unwrap().is_some());

        block_on(delegation.revoke(alice, bob, alice)).unwrap();
        assert!(block_on(delegation.active_grant(&order, bob)).unwrap().is_none());
        // The grant row itself is kept for history.
        assert!(block_on(world.delegation_store.share_grant(order_id, bob)).unwrap().is_some());

        block_on(delegation.invite(alice, "bob@example.com")).unwrap();
        let reaccepted = block_on(delegation.accept(alice, bob)).unwrap();
        assert_eq!(reaccepted.generation, 2);
        assert!(block_on(delegation.active_grant(&order, bob)).unwrap().is_none());

        assert_eq!(block_on(delegation.set_sharing(alice, order_id, bob, true)).unwrap(), ShareToggle::Granted);
        assert!(block_on(delegation.active_grant(&order, bob)).unwrap().is_some());
        assert_eq!(
            block_on(world.delegation_store.grants_for_order(order_id)).unwrap().len(),
            1
        );
        assert_eq!(
            block_on(delegation.orders_shared_with(bob)).unwrap()[0].order_id,
            order_id
        );
    }
}
