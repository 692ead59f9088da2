// src/backend/storage/staff.rs
use crate::error::LockerError;
use crate::models::{PrincipalId, StaffMember};
use crate::storage::memory::{Manager, Memory, STAFF_MEM_ID};
use crate::storage::storable::Cbor;
use ic_stable_structures::StableBTreeMap;
use std::cell::RefCell;

type PrincipalBytes = Vec<u8>;

/// Attendants, location managers and administrators, keyed by principal.
pub struct StableStaffRegistry {
    members: RefCell<StableBTreeMap<PrincipalBytes, Cbor<StaffMember>, Memory>>,
}

impl StableStaffRegistry {
    pub fn init(manager: &Manager) -> Self {
        Self {
            members: RefCell::new(StableBTreeMap::init(manager.get(STAFF_MEM_ID))),
        }
    }

    /// Inserts or replaces the staff record for the member's principal.
    pub fn upsert(&self, member: StaffMember) -> Option<StaffMember> {
        self.members
            .borrow_mut()
            .insert(member.principal.as_slice().to_vec(), Cbor(member))
            .map(|c| c.0)
    }

    pub fn remove(&self, principal: &PrincipalId) -> Result<StaffMember, LockerError> {
        self.members
            .borrow_mut()
            .remove(&principal.as_slice().to_vec())
            .map(|c| c.0)
            .ok_or_else(|| LockerError::NotFound(format!("Staff member {}", principal)))
    }

    pub fn get(&self, principal: &PrincipalId) -> Option<StaffMember> {
        self.members
            .borrow()
            .get(&principal.as_slice().to_vec())
            .map(|c| c.0)
    }

    pub fn list(&self) -> Vec<StaffMember> {
        self.members.borrow().iter().map(|(_, m)| m.0).collect()
    }
}
