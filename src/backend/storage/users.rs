// src/backend/storage/users.rs
use crate::adapter::IdentityProvider;
use crate::error::LockerError;
use crate::models::{PresentedIdentity, PrincipalId, Timestamp, UserId, UserProfile};
use crate::storage::memory::{
    Manager, Memory, USERS_BY_EMAIL_MEM_ID, USERS_BY_PRINCIPAL_MEM_ID, USERS_MEM_ID,
    USER_COUNTER_MEM_ID,
};
use crate::storage::storable::{init_error, Cbor};
use async_trait::async_trait;
use ic_stable_structures::{StableBTreeMap, StableCell};
use std::cell::RefCell;

type StorableProfile = Cbor<UserProfile>;
type PrincipalBytes = Vec<u8>; // Key for secondary index

/// Registration data accepted by the directory.
#[derive(Clone, Debug)]
pub struct NewProfile {
    pub principal: PrincipalId,
    pub email: String, // Normalized
    pub legal_name: String,
    pub photo_url: Option<String>,
}

/// Customer accounts known to the canister.
pub struct StableUserDirectory {
    /// Key = UserId
    profiles: RefCell<StableBTreeMap<UserId, StorableProfile, Memory>>,
    /// Secondary index: normalized email -> UserId
    by_email: RefCell<StableBTreeMap<String, UserId, Memory>>,
    /// Secondary index: principal bytes -> UserId
    by_principal: RefCell<StableBTreeMap<PrincipalBytes, UserId, Memory>>,
    next_id: RefCell<StableCell<u64, Memory>>,
}

impl StableUserDirectory {
    pub fn init(manager: &Manager) -> Result<Self, LockerError> {
        let next_id = StableCell::init(manager.get(USER_COUNTER_MEM_ID), 1)
            .map_err(|e| init_error("user counter", e))?;
        Ok(Self {
            profiles: RefCell::new(StableBTreeMap::init(manager.get(USERS_MEM_ID))),
            by_email: RefCell::new(StableBTreeMap::init(manager.get(USERS_BY_EMAIL_MEM_ID))),
            by_principal: RefCell::new(StableBTreeMap::init(manager.get(USERS_BY_PRINCIPAL_MEM_ID))),
            next_id: RefCell::new(next_id),
        })
    }

    /// Creates a profile. A principal or email can only be registered once.
    pub fn register(&self, profile: NewProfile, now: Timestamp) -> Result<UserProfile, LockerError> {
        let principal_bytes = profile.principal.as_slice().to_vec();
        if self.by_principal.borrow().contains_key(&principal_bytes) {
            return Err(LockerError::AlreadyExists(format!(
                "Principal {} already has an account",
                profile.principal
            )));
        }
        if self.by_email.borrow().contains_key(&profile.email) {
            return Err(LockerError::AlreadyExists(format!(
                "Email {} is already registered",
                profile.email
            )));
        }

        let user_id = {
            let mut cell = self.next_id.borrow_mut();
            let current = *cell.get();
            let next = current
                .checked_add(1)
                .ok_or_else(|| LockerError::InternalError("User counter overflow".to_string()))?;
            cell.set(next)
                .map_err(|e| LockerError::StorageError(format!("Failed to update user counter: {:?}", e)))?;
            current
        };

        let stored = UserProfile {
            user_id,
            principal: profile.principal,
            email: profile.email,
            legal_name: profile.legal_name,
            photo_url: profile.photo_url,
            registered_at: now,
        };
        self.profiles.borrow_mut().insert(user_id, Cbor(stored.clone()));
        self.by_email.borrow_mut().insert(stored.email.clone(), user_id);
        self.by_principal.borrow_mut().insert(principal_bytes, user_id);
        Ok(stored)
    }

    pub fn profile(&self, user_id: UserId) -> Option<UserProfile> {
        self.profiles.borrow().get(&user_id).map(|c| c.0)
    }

    pub fn user_for_principal(&self, principal: &PrincipalId) -> Option<UserId> {
        self.by_principal.borrow().get(&principal.as_slice().to_vec())
    }

    pub fn profile_for_principal(&self, principal: &PrincipalId) -> Option<UserProfile> {
        self.user_for_principal(principal)
            .and_then(|user_id| self.profile(user_id))
    }
}

#[async_trait(?Send)]
impl IdentityProvider for StableUserDirectory {
    async fn user_by_email(&self, email: &str) -> Result<Option<UserId>, LockerError> {
        Ok(self.by_email.borrow().get(&email.to_string()))
    }

    async fn presented_identity(&self, user_id: UserId) -> Result<Option<PresentedIdentity>, LockerError> {
        Ok(self.profile(user_id).as_ref().map(PresentedIdentity::from))
    }
}
