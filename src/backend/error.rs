// src/backend/error.rs
use crate::models::common::OrderId;
use candid::CandidType;
use serde::Deserialize;
use thiserror::Error;

/// Caller and infrastructure failures.
///
/// Pickup business outcomes (token rejections, denial reasons) are never
/// represented here; they travel inside `Ok` values so a caller cannot
/// mistake a storage outage for a security decision.
#[derive(CandidType, Deserialize, Error, Debug, Clone, PartialEq, Eq)]
pub enum LockerError {
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Collaborator failure: {0}")]
    CollaboratorFailure(String),

    #[error("Internal canister error: {0}")]
    InternalError(String),
}

impl LockerError {
    /// True for failures the presentation surface may retry as-is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LockerError::StorageError(_)
                | LockerError::ServiceUnavailable(_)
                | LockerError::RateLimitExceeded(_)
                | LockerError::CollaboratorFailure(_)
        )
    }
}

impl From<validator::ValidationErrors> for LockerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        LockerError::InvalidInput(errors.to_string())
    }
}
