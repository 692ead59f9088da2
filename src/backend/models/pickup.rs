// src/backend/models/pickup.rs
use crate::models::common::{OrderId, Timestamp, UserId};
use crate::models::order::Order;
use crate::models::user::PresentedIdentity;
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Fields recovered from a pickup token that passed validation.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PickupTokenClaims {
    pub order_id: OrderId,
    pub subject_id: UserId,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

/// A freshly minted token, as handed to the customer's pickup screen.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub order_id: OrderId,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub refresh_after: Timestamp, // Client should request a new token after this
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum TokenRejection {
    Expired,
    Malformed,
    Tampered,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum DenialReason {
    OrderNotFound,
    NotYetDelivered,
    AlreadyPickedUp,
    NotAuthorized,
}

impl DenialReason {
    /// The reason shown at the locker counter.
    ///
    /// An unauthorized presenter learns nothing about whether the order exists.
    pub fn for_attendant(self) -> DenialReason {
        match self {
            DenialReason::OrderNotFound => DenialReason::NotAuthorized,
            other => other,
        }
    }
}

/// Why the subject may collect the order.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationBasis {
    Owner,
    TrustedContact {
        account_holder_id: UserId,
        granted_at: Timestamp,
    },
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationResult {
    Authorized {
        order: Order,
        presented_identity: PresentedIdentity,
        basis: AuthorizationBasis,
    },
    Denied {
        reason: DenialReason,
    },
}

impl AuthorizationResult {
    pub fn denied(reason: DenialReason) -> Self {
        AuthorizationResult::Denied { reason }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationResult::Authorized { .. })
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AuthorizationResult::Denied { reason } => Some(*reason),
            AuthorizationResult::Authorized { .. } => None,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Success {
        order_id: OrderId,
        picked_up_at: Timestamp,
        collected_by: UserId,
    },
    Denied {
        reason: DenialReason,
    },
}

impl CommitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommitOutcome::Success { .. })
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            CommitOutcome::Denied { reason } => Some(*reason),
            CommitOutcome::Success { .. } => None,
        }
    }
}

/// Attendant scan of a presented token.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    TokenRejected(TokenRejection),
    Resolved(AuthorizationResult),
}

impl ScanOutcome {
    pub fn for_attendant(self) -> Self {
        match self {
            ScanOutcome::Resolved(AuthorizationResult::Denied { reason }) => {
                ScanOutcome::Resolved(AuthorizationResult::denied(reason.for_attendant()))
            }
            other => other,
        }
    }
}

/// Attendant confirmation of a handover.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    TokenRejected(TokenRejection),
    Committed(CommitOutcome),
}

impl ConfirmOutcome {
    pub fn for_attendant(self) -> Self {
        match self {
            ConfirmOutcome::Committed(CommitOutcome::Denied { reason }) => {
                ConfirmOutcome::Committed(CommitOutcome::Denied {
                    reason: reason.for_attendant(),
                })
            }
            other => other,
        }
    }
}
