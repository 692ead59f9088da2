// src/backend/state.rs
//! The canister's wired service graph over the global memory manager.

use crate::adapter::Clock;
use crate::error::LockerError;
use crate::metrics;
use crate::models::{PrincipalId, UserId};
use crate::services::scheduler::{perform_maintenance, MaintenanceReport};
use crate::services::token_service::{TokenPolicy, SIGNING_KEY_LEN};
use crate::services::{Collaborators, LockerServices};
use crate::storage::config::{get_config, set_signing_key, signing_key, LockerConfig, SigningKeyRecord};
use crate::storage::memory::{with_manager, Manager};
use crate::storage::{
    ReadyForPickupCache, StableDelegationStore, StableEffectJournal, StableNotificationInbox, StableOrderLedger,
    StableStaffRegistry, StableUsageLog, StableUserDirectory,
};
use crate::utils::rng;
use crate::utils::time::IcClock;
use std::rc::Rc;

pub struct LockerState {
    pub services: LockerServices,
    pub users: Rc<StableUserDirectory>,
    pub staff: Rc<StableStaffRegistry>,
    pub inbox: Rc<StableNotificationInbox>,
    pub usage: Rc<StableUsageLog>,
    pub cache: Rc<ReadyForPickupCache>,
    pub clock: Rc<dyn Clock>,
}

impl LockerState {
    pub fn build(manager: &Manager, clock: Rc<dyn Clock>, policy: TokenPolicy) -> Result<Self, LockerError> {
        let ledger = Rc::new(StableOrderLedger::init(manager)?);
        let delegation_store = Rc::new(StableDelegationStore::init(manager)?);
        let users = Rc::new(StableUserDirectory::init(manager)?);
        let staff = Rc::new(StableStaffRegistry::init(manager));
        let inbox = Rc::new(StableNotificationInbox::init(manager, clock.clone()));
        let usage = Rc::new(StableUsageLog::init(manager, clock.clone())?);
        let cache = Rc::new(ReadyForPickupCache::new());
        let journal = Rc::new(StableEffectJournal::init(manager));

        let services = LockerServices::assemble(
            Collaborators {
                ledger,
                delegation_store,
                identity: users.clone(),
                notifier: inbox.clone(),
                metering: usage.clone(),
                ready_cache: cache.clone(),
                journal,
                clock: clock.clone(),
            },
            policy,
        );
        Ok(Self {
            services,
            users,
            staff,
            inbox,
            usage,
            cache,
            clock,
        })
    }
}

/// Token policy from the stored config, falling back to defaults if the
/// stored values are out of range.
pub fn policy_from_config(config: &LockerConfig) -> TokenPolicy {
    TokenPolicy::checked(config.token_ttl_secs, config.token_refresh_secs).unwrap_or_else(|e| {
        log_warn!("TOKEN: stored policy rejected ({}), using defaults", e);
        TokenPolicy::default()
    })
}

fn build_canister_state() -> LockerState {
    let policy = policy_from_config(&get_config());
    let state = with_manager(|manager| LockerState::build(manager, Rc::new(IcClock), policy))
        .expect("Failed to initialize locker state");
    if let Some(record) = signing_key() {
        if let Err(e) = state.services.tokens.install_signing_key(record.key) {
            log_error!("TOKEN: persisted signing key rejected: {}", e);
        }
    }
    state
}

thread_local! {
    static STATE: LockerState = build_canister_state();
}

pub fn with_state<R>(f: impl FnOnce(&LockerState) -> R) -> R {
    STATE.with(f)
}

pub fn services() -> LockerServices {
    with_state(|state| state.services.clone())
}

pub fn is_staff(principal: &PrincipalId) -> bool {
    with_state(|state| state.staff.get(principal).is_some())
}

/// The customer account bound to `principal`.
pub fn customer_id(principal: &PrincipalId) -> Result<UserId, LockerError> {
    with_state(|state| state.users.user_for_principal(principal))
        .ok_or_else(|| LockerError::NotFound("No customer account for caller".to_string()))
}

/// Installs the persisted signing key, generating and persisting one first
/// if the canister has none yet.
pub async fn ensure_signing_key() -> Result<(), LockerError> {
    let tokens = services().tokens;
    if tokens.has_signing_key() {
        return Ok(());
    }
    if let Some(record) = signing_key() {
        return tokens.install_signing_key(record.key);
    }
    if !rng::is_seeded() {
        rng::initialize_internal_rng().await?;
    }
    let record = SigningKeyRecord {
        key: rng::random_bytes(SIGNING_KEY_LEN)?,
        created_at: with_state(|state| state.clock.now()),
    };
    set_signing_key(record.clone())?;
    tokens.install_signing_key(record.key)?;
    log_info!("TOKEN: generated new signing key");
    Ok(())
}

pub async fn run_maintenance() -> Result<MaintenanceReport, LockerError> {
    let config = get_config();
    let (services, cache, now) = with_state(|state| (state.services.clone(), state.cache.clone(), state.clock.now()));
    let report = perform_maintenance(&services, &cache, now, config.invitation_retention_secs).await?;
    metrics::record_effect_failures(u64::from(report.effects_failed));
    metrics::record_maintenance_run(now);
    Ok(report)
}
