// src/backend/models/relationship.rs
use crate::models::common::{InternalId, RelationshipStatus, Timestamp, UserId};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Directed trust from an account holder to one of their contacts.
///
/// At most one row exists per `(account_holder_id, trusted_contact_id)`.
/// `generation` is bumped on every transition into `Accepted`; share grants
/// remember the generation they were created under.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TrustedContactRelationship {
    pub account_holder_id: UserId,
    pub trusted_contact_id: UserId,
    pub status: RelationshipStatus,
    pub generation: u32,
    pub invited_at: Timestamp,
    pub accepted_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub revoked_by: Option<UserId>,
    pub updated_at: Timestamp,
}

impl TrustedContactRelationship {
    pub fn invited(account_holder_id: UserId, trusted_contact_id: UserId, now: Timestamp) -> Self {
        Self {
            account_holder_id,
            trusted_contact_id,
            status: RelationshipStatus::Pending,
            generation: 0,
            invited_at: now,
            accepted_at: None,
            revoked_at: None,
            revoked_by: None,
            updated_at: now,
        }
    }

    pub fn key(&self) -> (UserId, UserId) {
        (self.account_holder_id, self.trusted_contact_id)
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.account_holder_id == user || self.trusted_contact_id == user
    }
}

/// An invitation addressed to an email that has no account yet.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingInvitation {
    pub invitation_id: InternalId,
    pub email: String, // Normalized
    pub account_holder_id: UserId,
    pub created_at: Timestamp,
    pub processed: bool,
    pub processed_at: Option<Timestamp>,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum InvitationOutcome {
    RelationshipCreated(TrustedContactRelationship),
    InvitationQueued(PendingInvitation),
    AlreadyInvited(TrustedContactRelationship),
}

/// Result of an insert guarded by the pair uniqueness constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    Inserted(T),
    Conflict(T), // Carries the row already present
}
