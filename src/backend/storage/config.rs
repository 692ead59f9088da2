// src/backend/storage/config.rs
use crate::error::LockerError;
use crate::models::init::InitArgs;
use crate::models::{PrincipalId, Timestamp};
use crate::storage::memory::{get_memory, Memory, CONFIG_MEM_ID};
use crate::storage::storable::Cbor;
use candid::{CandidType, Principal};
use ic_stable_structures::StableCell;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;
pub const DEFAULT_TOKEN_REFRESH_SECS: u64 = 60;
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_INVITATION_RETENTION_SECS: u64 = 30 * 24 * 60 * 60;

/// HMAC key used to sign pickup tokens.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SigningKeyRecord {
    #[serde(with = "serde_bytes")]
    pub key: Vec<u8>,
    pub created_at: Timestamp,
}

impl std::fmt::Debug for SigningKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyRecord")
            .field("key", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LockerConfig {
    pub admin_principal: PrincipalId,
    pub token_ttl_secs: u64,
    pub token_refresh_secs: u64,
    pub maintenance_interval_secs: u64,
    pub invitation_retention_secs: u64,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            admin_principal: Principal::anonymous(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            token_refresh_secs: DEFAULT_TOKEN_REFRESH_SECS,
            maintenance_interval_secs: DEFAULT_MAINTENANCE_INTERVAL_SECS,
            invitation_retention_secs: DEFAULT_INVITATION_RETENTION_SECS,
        }
    }
}

impl From<&InitArgs> for LockerConfig {
    fn from(args: &InitArgs) -> Self {
        Self {
            admin_principal: args.admin_principal,
            token_ttl_secs: args.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            token_refresh_secs: args.token_refresh_secs.unwrap_or(DEFAULT_TOKEN_REFRESH_SECS),
            maintenance_interval_secs: args
                .maintenance_interval_secs
                .unwrap_or(DEFAULT_MAINTENANCE_INTERVAL_SECS),
            invitation_retention_secs: args
                .invitation_retention_secs
                .unwrap_or(DEFAULT_INVITATION_RETENTION_SECS),
        }
    }
}

/// Everything persisted in the configuration cell.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct ConfigState {
    config: LockerConfig,
    signing_key: Option<SigningKeyRecord>,
}

thread_local! {
    /// Stable cell for configuration and the token signing key
    static CONFIG: RefCell<StableCell<Cbor<ConfigState>, Memory>> = RefCell::new(
        StableCell::init(get_memory(CONFIG_MEM_ID), Cbor(ConfigState::default()))
            .expect("Failed to initialize config stable cell")
    );
}

fn update_state<F>(change: F) -> Result<(), LockerError>
where
    F: FnOnce(&mut ConfigState),
{
    CONFIG.with(|cell| {
        let mut state = cell.borrow().get().0.clone();
        change(&mut state);
        cell.borrow_mut()
            .set(Cbor(state))
            .map_err(|e| LockerError::StorageError(format!("Failed to update config: {:?}", e)))?;
        Ok(())
    })
}

/// Stores the configuration from init arguments. The signing key is kept.
pub fn init_config(config: LockerConfig) -> Result<(), LockerError> {
    update_state(|state| state.config = config)
}

pub fn get_config() -> LockerConfig {
    CONFIG.with(|cell| cell.borrow().get().0.config.clone())
}

pub fn update_config<F>(change: F) -> Result<LockerConfig, LockerError>
where
    F: FnOnce(&mut LockerConfig),
{
    let mut updated = None;
    update_state(|state| {
        change(&mut state.config);
        updated = Some(state.config.clone());
    })?;
    updated.ok_or_else(|| LockerError::InternalError("Config update produced no value".to_string()))
}

pub fn get_admin_principal() -> PrincipalId {
    CONFIG.with(|cell| cell.borrow().get().0.config.admin_principal)
}

pub fn signing_key() -> Option<SigningKeyRecord> {
    CONFIG.with(|cell| cell.borrow().get().0.signing_key.clone())
}

pub fn set_signing_key(record: SigningKeyRecord) -> Result<(), LockerError> {
    update_state(|state| state.signing_key = Some(record))
}
