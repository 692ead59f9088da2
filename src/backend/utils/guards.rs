// src/backend/utils/guards.rs
// Endpoint guards. Guard functions return `Result<(), String>` as ic-cdk requires.

use crate::error::LockerError;
use crate::storage::config::get_admin_principal;
use candid::Principal;

/// Rejects the anonymous principal.
pub fn check_not_anonymous(caller: Principal) -> Result<(), LockerError> {
    if caller == Principal::anonymous() {
        Err(LockerError::NotAuthorized(
            "Anonymous callers are not allowed".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Checks if the caller is the designated admin principal.
pub fn check_admin(caller: Principal, admin_principal: Principal) -> Result<(), LockerError> {
    check_not_anonymous(caller)?;
    if caller == admin_principal {
        Ok(())
    } else {
        Err(LockerError::NotAuthorized(
            "Caller is not the canister admin".to_string(),
        ))
    }
}

pub fn not_anonymous_guard() -> Result<(), String> {
    check_not_anonymous(ic_cdk::caller()).map_err(|e| e.to_string())
}

pub fn admin_guard() -> Result<(), String> {
    check_admin(ic_cdk::caller(), get_admin_principal()).map_err(|e| e.to_string())
}

/// Caller must be registered staff or the admin.
pub fn staff_guard() -> Result<(), String> {
    let caller = ic_cdk::caller();
    check_not_anonymous(caller).map_err(|e| e.to_string())?;
    if caller == get_admin_principal() || crate::state::is_staff(&caller) {
        Ok(())
    } else {
        Err(LockerError::NotAuthorized("Caller is not registered staff".to_string()).to_string())
    }
}
