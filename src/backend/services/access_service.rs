// src/backend/services/access_service.rs
use crate::error::LockerError;
use crate::models::{AccessScope, PrincipalId, StaffRole};
use crate::storage::StableStaffRegistry;
use candid::CandidType;
use serde::Deserialize;

/// What a staff caller may do, resolved once per request.
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StaffContext {
    pub principal: PrincipalId,
    pub role: StaffRole,
    pub scope: AccessScope,
    pub can_manage_intake: bool,
}

impl StaffContext {
    pub fn require_intake(&self) -> Result<(), LockerError> {
        if self.can_manage_intake {
            Ok(())
        } else {
            Err(LockerError::NotAuthorized(
                "Attendants cannot change order intake state".to_string(),
            ))
        }
    }
}

pub fn scope_for(role: &StaffRole) -> AccessScope {
    match role {
        StaffRole::Administrator => AccessScope::AllLocations,
        StaffRole::LocationManager { locations } | StaffRole::Attendant { locations } => {
            AccessScope::LocationSet(locations.clone())
        }
    }
}

fn context_for(principal: PrincipalId, role: StaffRole) -> StaffContext {
    StaffContext {
        principal,
        scope: scope_for(&role),
        can_manage_intake: !matches!(role, StaffRole::Attendant { .. }),
        role,
    }
}

/// Resolves the caller's staff capabilities. The canister admin always acts
/// as an administrator.
pub fn staff_context(
    registry: &StableStaffRegistry,
    admin_principal: PrincipalId,
    caller: PrincipalId,
) -> Result<StaffContext, LockerError> {
    if caller == admin_principal {
        return Ok(context_for(caller, StaffRole::Administrator));
    }
    registry
        .get(&caller)
        .map(|member| context_for(caller, member.role))
        .ok_or_else(|| LockerError::NotAuthorized("Caller is not registered staff".to_string()))
}
