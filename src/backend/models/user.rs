// src/backend/models/user.rs
use crate::models::common::{LocationId, PrincipalId, Timestamp, UserId};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub principal: PrincipalId,
    pub email: String, // Normalized
    pub legal_name: String,
    pub photo_url: Option<String>,
    pub registered_at: Timestamp,
}

/// Evidence an attendant uses to match the person at the counter.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PresentedIdentity {
    pub user_id: UserId,
    pub legal_name: String,
    pub photo_url: Option<String>,
}

impl From<&UserProfile> for PresentedIdentity {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            legal_name: profile.legal_name.clone(),
            photo_url: profile.photo_url.clone(),
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum StaffRole {
    Administrator,
    LocationManager { locations: BTreeSet<LocationId> },
    Attendant { locations: BTreeSet<LocationId> },
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StaffMember {
    pub principal: PrincipalId,
    pub display_name: String,
    pub role: StaffRole,
    pub added_at: Timestamp,
}

/// Which locker locations a staff request may act on.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum AccessScope {
    AllLocations,
    LocationSet(BTreeSet<LocationId>),
}

impl AccessScope {
    pub fn covers(&self, location: LocationId) -> bool {
        match self {
            AccessScope::AllLocations => true,
            AccessScope::LocationSet(locations) => locations.contains(&location),
        }
    }
}
