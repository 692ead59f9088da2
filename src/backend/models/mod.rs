pub mod common;
pub mod init;
pub mod notification;
pub mod order;
pub mod pickup;
pub mod relationship;
pub mod share_grant;
pub mod usage;
pub mod user;

// Re-export common types/enums for easier access
pub use common::*;
pub use notification::Notification;
pub use order::{NewOrder, Order, ReadyForPickup};
pub use pickup::*;
pub use relationship::{InsertOutcome, InvitationOutcome, PendingInvitation, TrustedContactRelationship};
pub use share_grant::{ShareGrant, ShareToggle};
pub use usage::{PickupEffectRecord, UsageEvent, UsageEventType};
pub use user::{AccessScope, PresentedIdentity, StaffMember, StaffRole, UserProfile};
