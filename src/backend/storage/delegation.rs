// src/backend/storage/delegation.rs
use crate::adapter::DelegationStore;
use crate::error::LockerError;
use crate::models::{
    InsertOutcome, InternalId, OrderId, PendingInvitation, ShareGrant, Timestamp,
    TrustedContactRelationship, UserId,
};
use crate::storage::memory::{
    Manager, Memory, GRANTS_BY_CONTACT_MEM_ID, GRANTS_MEM_ID, INVITATIONS_BY_EMAIL_MEM_ID,
    INVITATIONS_MEM_ID, INVITATION_COUNTER_MEM_ID, RELATIONSHIPS_BY_CONTACT_MEM_ID,
    RELATIONSHIPS_MEM_ID,
};
use crate::storage::storable::{init_error, Cbor};
use async_trait::async_trait;
use ic_stable_structures::{StableBTreeMap, StableCell};
use std::cell::RefCell;

type PairKey = (UserId, UserId);

/// Delegation graph rows in stable memory.
pub struct StableDelegationStore {
    /// Key = (AccountHolderId, TrustedContactId); the pair uniqueness constraint
    relationships: RefCell<StableBTreeMap<PairKey, Cbor<TrustedContactRelationship>, Memory>>,
    /// Secondary index: (TrustedContactId, AccountHolderId) -> invited_at
    relationships_by_contact: RefCell<StableBTreeMap<PairKey, Timestamp, Memory>>,
    /// Key = (OrderId, SharedWithId)
    grants: RefCell<StableBTreeMap<(OrderId, UserId), Cbor<ShareGrant>, Memory>>,
    /// Secondary index: (SharedWithId, OrderId) -> created_at of the first grant
    grants_by_contact: RefCell<StableBTreeMap<(UserId, OrderId), Timestamp, Memory>>,
    /// Key = invitation id
    invitations: RefCell<StableBTreeMap<InternalId, Cbor<PendingInvitation>, Memory>>,
    /// Secondary index: "{email}\n{invitation_id}" -> invitation id
    invitations_by_email: RefCell<StableBTreeMap<String, InternalId, Memory>>,
    invitation_counter: RefCell<StableCell<u64, Memory>>,
}

fn email_index_prefix(email: &str) -> String {
    format!("{}\n", email)
}

fn email_index_key(email: &str, invitation_id: InternalId) -> String {
    format!("{}\n{:020}", email, invitation_id)
}

impl StableDelegationStore {
    pub fn init(manager: &Manager) -> Result<Self, LockerError> {
        let invitation_counter = StableCell::init(manager.get(INVITATION_COUNTER_MEM_ID), 1)
            .map_err(|e| init_error("invitation counter", e))?;
        Ok(Self {
            relationships: RefCell::new(StableBTreeMap::init(manager.get(RELATIONSHIPS_MEM_ID))),
            relationships_by_contact: RefCell::new(StableBTreeMap::init(
                manager.get(RELATIONSHIPS_BY_CONTACT_MEM_ID),
            )),
            grants: RefCell::new(StableBTreeMap::init(manager.get(GRANTS_MEM_ID))),
            grants_by_contact: RefCell::new(StableBTreeMap::init(manager.get(GRANTS_BY_CONTACT_MEM_ID))),
            invitations: RefCell::new(StableBTreeMap::init(manager.get(INVITATIONS_MEM_ID))),
            invitations_by_email: RefCell::new(StableBTreeMap::init(
                manager.get(INVITATIONS_BY_EMAIL_MEM_ID),
            )),
            invitation_counter: RefCell::new(invitation_counter),
        })
    }

    fn next_invitation_id(&self) -> Result<InternalId, LockerError> {
        let mut cell = self.invitation_counter.borrow_mut();
        let current = *cell.get();
        let next = current
            .checked_add(1)
            .ok_or_else(|| LockerError::InternalError("Invitation counter overflow".to_string()))?;
        cell.set(next).map_err(|e| {
            LockerError::StorageError(format!("Failed to update invitation counter: {:?}", e))
        })?;
        Ok(current)
    }

    fn invitations_for_email(&self, email: &str) -> Vec<PendingInvitation> {
        let prefix = email_index_prefix(email);
        let index = self.invitations_by_email.borrow();
        let invitations = self.invitations.borrow();
        index
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(_, id)| invitations.get(&id).map(|c| c.0))
            .collect()
    }
}

#[async_trait(?Send)]
impl DelegationStore for StableDelegationStore {
    async fn relationship(
        &self,
        account_holder_id: UserId,
        trusted_contact_id: UserId,
    ) -> Result<Option<TrustedContactRelationship>, LockerError> {
        Ok(self
            .relationships
            .borrow()
            .get(&(account_holder_id, trusted_contact_id))
            .map(|c| c.0))
    }

    async fn insert_relationship_if_absent(
        &self,
        relationship: TrustedContactRelationship,
    ) -> Result<InsertOutcome<TrustedContactRelationship>, LockerError> {
        let key = relationship.key();
        let mut relationships = self.relationships.borrow_mut();
        if let Some(existing) = relationships.get(&key) {
            return Ok(InsertOutcome::Conflict(existing.0));
        }
        relationships.insert(key, Cbor(relationship.clone()));
        self.relationships_by_contact
            .borrow_mut()
            .insert((key.1, key.0), relationship.invited_at);
        Ok(InsertOutcome::Inserted(relationship))
    }

    async fn save_relationship(&self, relationship: &TrustedContactRelationship) -> Result<(), LockerError> {
        let key = relationship.key();
        self.relationships
            .borrow_mut()
            .insert(key, Cbor(relationship.clone()));
        self.relationships_by_contact
            .borrow_mut()
            .insert((key.1, key.0), relationship.invited_at);
        Ok(())
    }

    async fn relationships_for_holder(
        &self,
        account_holder_id: UserId,
    ) -> Result<Vec<TrustedContactRelationship>, LockerError> {
        Ok(self
            .relationships
            .borrow()
            .range((account_holder_id, UserId::MIN)..=(account_holder_id, UserId::MAX))
            .map(|(_, rel)| rel.0)
            .collect())
    }

    async fn relationships_for_contact(
        &self,
        trusted_contact_id: UserId,
    ) -> Result<Vec<TrustedContactRelationship>, LockerError> {
        let index = self.relationships_by_contact.borrow();
        let relationships = self.relationships.borrow();
        Ok(index
            .range((trusted_contact_id, UserId::MIN)..=(trusted_contact_id, UserId::MAX))
            .filter_map(|((contact, holder), _)| relationships.get(&(holder, contact)).map(|c| c.0))
            .collect())
    }

    async fn share_grant(
        &self,
        order_id: OrderId,
        shared_with_id: UserId,
    ) -> Result<Option<ShareGrant>, LockerError> {
        Ok(self
            .grants
            .borrow()
            .get(&(order_id, shared_with_id))
            .map(|c| c.0))
    }

    async fn save_share_grant(&self, grant: &ShareGrant) -> Result<(), LockerError> {
        self.grants
            .borrow_mut()
            .insert((grant.order_id, grant.shared_with_id), Cbor(grant.clone()));
        let mut index = self.grants_by_contact.borrow_mut();
        let index_key = (grant.shared_with_id, grant.order_id);
        if !index.contains_key(&index_key) {
            index.insert(index_key, grant.created_at);
        }
        Ok(())
    }

    async fn grants_for_order(&self, order_id: OrderId) -> Result<Vec<ShareGrant>, LockerError> {
        Ok(self
            .grants
            .borrow()
            .range((order_id, UserId::MIN)..=(order_id, UserId::MAX))
            .map(|(_, grant)| grant.0)
            .collect())
    }

    async fn grants_for_contact(&self, shared_with_id: UserId) -> Result<Vec<ShareGrant>, LockerError> {
        let index = self.grants_by_contact.borrow();
        let grants = self.grants.borrow();
        Ok(index
            .range((shared_with_id, OrderId::MIN)..=(shared_with_id, OrderId::MAX))
            .filter_map(|((contact, order_id), _)| grants.get(&(order_id, contact)).map(|c| c.0))
            .collect())
    }

    async fn queue_invitation(
        &self,
        email: &str,
        account_holder_id: UserId,
        at: Timestamp,
    ) -> Result<PendingInvitation, LockerError> {
        if let Some(existing) = self
            .invitations_for_email(email)
            .into_iter()
            .find(|inv| !inv.processed && inv.account_holder_id == account_holder_id)
        {
            return Ok(existing);
        }

        let invitation = PendingInvitation {
            invitation_id: self.next_invitation_id()?,
            email: email.to_string(),
            account_holder_id,
            created_at: at,
            processed: false,
            processed_at: None,
        };
        self.invitations
            .borrow_mut()
            .insert(invitation.invitation_id, Cbor(invitation.clone()));
        self.invitations_by_email
            .borrow_mut()
            .insert(email_index_key(email, invitation.invitation_id), invitation.invitation_id);
        Ok(invitation)
    }

    async fn unprocessed_invitations(&self, email: &str) -> Result<Vec<PendingInvitation>, LockerError> {
        Ok(self
            .invitations_for_email(email)
            .into_iter()
            .filter(|inv| !inv.processed)
            .collect())
    }

    async fn mark_invitation_processed(
        &self,
        invitation_id: InternalId,
        at: Timestamp,
    ) -> Result<bool, LockerError> {
        let mut invitations = self.invitations.borrow_mut();
        let Some(Cbor(mut invitation)) = invitations.get(&invitation_id) else {
            return Err(LockerError::NotFound(format!("Invitation {}", invitation_id)));
        };
        if invitation.processed {
            return Ok(false);
        }
        invitation.processed = true;
        invitation.processed_at = Some(at);
        invitations.insert(invitation_id, Cbor(invitation));
        Ok(true)
    }

    async fn purge_processed_invitations(&self, processed_before: Timestamp) -> Result<u64, LockerError> {
        let stale: Vec<PendingInvitation> = self
            .invitations
            .borrow()
            .iter()
            .map(|(_, inv)| inv.0)
            .filter(|inv| inv.processed && inv.processed_at.is_some_and(|at| at < processed_before))
            .collect();

        let mut invitations = self.invitations.borrow_mut();
        let mut index = self.invitations_by_email.borrow_mut();
        for inv in &stale {
            invitations.remove(&inv.invitation_id);
            index.remove(&email_index_key(&inv.email, inv.invitation_id));
        }
        Ok(stale.len() as u64)
    }
}
