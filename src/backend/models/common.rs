// src/backend/models/common.rs
use candid::{CandidType, Principal};
use serde::{Deserialize, Serialize};

pub type OrderId = u64;
pub type UserId = u64; // Customer account id issued by the identity directory
pub type LocationId = u64;
pub type PrincipalId = Principal;

pub type Timestamp = u64; // Nanoseconds since epoch (IC system time)
pub type InternalId = u64; // Internal counter/ID for storage

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Converts whole seconds into the nanosecond timestamps used throughout.
pub const fn secs_to_nanos(secs: u64) -> Timestamp {
    secs.saturating_mul(NANOS_PER_SEC)
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum OrderStage {
    Ordered,
    Shipped,   // Informational only
    Delivered, // Arrived at the locker location
    PickedUp,  // Terminal
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum RelationshipStatus {
    Pending,  // Invited, not yet accepted
    Accepted,
    Revoked,
}

/// Normalizes an email for lookups: trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn seconds_convert_to_nanoseconds() {
        assert_eq!(secs_to_nanos(2), 2_000_000_000);
        assert_eq!(secs_to_nanos(u64::MAX), u64::MAX);
    }
}
