// src/backend/storage/mod.rs
// Stable-memory stores behind the collaborator traits, plus config and metrics cells.

pub mod config;
pub mod delegation;
pub mod effects;
pub mod memory;
pub mod metrics;
pub mod notifications;
pub mod orders;
pub mod ready_cache;
pub mod staff;
pub mod storable;
pub mod usage;
pub mod users;

// Re-export key storage structures for easier access
pub use delegation::StableDelegationStore;
pub use effects::StableEffectJournal;
pub use memory::{Manager, Memory};
pub use notifications::StableNotificationInbox;
pub use orders::StableOrderLedger;
pub use ready_cache::ReadyForPickupCache;
pub use staff::StableStaffRegistry;
pub use storable::Cbor;
pub use usage::StableUsageLog;
pub use users::{NewProfile, StableUserDirectory};
