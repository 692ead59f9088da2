// src/backend/storage/memory.rs
use ic_stable_structures::memory_manager::{MemoryId, MemoryManager, VirtualMemory};
use ic_stable_structures::DefaultMemoryImpl;
use std::cell::RefCell;

// Define Memory IDs for stable structures
// Choose non-overlapping IDs
pub const CONFIG_MEM_ID: MemoryId = MemoryId::new(0);
pub const METRICS_MEM_ID: MemoryId = MemoryId::new(1);
pub const ORDERS_MEM_ID: MemoryId = MemoryId::new(2);
pub const ORDERS_BY_CUSTOMER_MEM_ID: MemoryId = MemoryId::new(3);
pub const ORDER_COUNTER_MEM_ID: MemoryId = MemoryId::new(4);
pub const RELATIONSHIPS_MEM_ID: MemoryId = MemoryId::new(5);
pub const RELATIONSHIPS_BY_CONTACT_MEM_ID: MemoryId = MemoryId::new(6);
pub const GRANTS_MEM_ID: MemoryId = MemoryId::new(7);
pub const GRANTS_BY_CONTACT_MEM_ID: MemoryId = MemoryId::new(8);
pub const INVITATIONS_MEM_ID: MemoryId = MemoryId::new(9);
pub const INVITATIONS_BY_EMAIL_MEM_ID: MemoryId = MemoryId::new(10);
pub const INVITATION_COUNTER_MEM_ID: MemoryId = MemoryId::new(11);
pub const USERS_MEM_ID: MemoryId = MemoryId::new(12);
pub const USERS_BY_EMAIL_MEM_ID: MemoryId = MemoryId::new(13);
pub const USERS_BY_PRINCIPAL_MEM_ID: MemoryId = MemoryId::new(14);
pub const USER_COUNTER_MEM_ID: MemoryId = MemoryId::new(15);
pub const STAFF_MEM_ID: MemoryId = MemoryId::new(16);
pub const NOTIFICATIONS_MEM_ID: MemoryId = MemoryId::new(17);
pub const USAGE_LOG_INDEX_MEM_ID: MemoryId = MemoryId::new(18);
pub const USAGE_LOG_DATA_MEM_ID: MemoryId = MemoryId::new(19);
pub const EFFECT_JOURNAL_MEM_ID: MemoryId = MemoryId::new(20);
// Reserve IDs 21-39 for future use

// Define memory type alias
pub type Memory = VirtualMemory<DefaultMemoryImpl>;
pub type Manager = MemoryManager<DefaultMemoryImpl>;

thread_local! {
    // Memory manager backing every store of the canister
    static MEMORY_MANAGER: RefCell<Manager> = RefCell::new(
        MemoryManager::init(DefaultMemoryImpl::default())
    );
}

/// Get memory instance for a specific MemoryId.
pub fn get_memory(id: MemoryId) -> Memory {
    MEMORY_MANAGER.with(|m| m.borrow().get(id))
}

/// Runs `f` against the canister's memory manager.
pub fn with_manager<R>(f: impl FnOnce(&Manager) -> R) -> R {
    MEMORY_MANAGER.with(|m| f(&m.borrow()))
}

/// A manager over fresh heap memory. Off-wasm `DefaultMemoryImpl` is a
/// vector memory, so stores built on this behave exactly like in the canister.
pub fn detached_manager() -> Manager {
    MemoryManager::init(DefaultMemoryImpl::default())
}
