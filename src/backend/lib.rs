// src/backend/lib.rs

#[macro_use]
pub mod utils;

pub mod adapter;
pub mod api;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

use crate::api::*;
use crate::error::LockerError;
use crate::models::init::InitArgs;
use crate::models::*;
use crate::services::scheduler::{start_maintenance_timer, MaintenanceReport};
use crate::storage::config::{get_config, init_config, LockerConfig};
use candid::Principal;
use std::time::Duration;
use validator::Validate;

/// Starts the maintenance interval and, right after this message, seeds the
/// generator and installs the signing key.
fn start_background_tasks(config: &LockerConfig) {
    start_maintenance_timer(config.maintenance_interval_secs);
    ic_cdk_timers::set_timer(Duration::ZERO, || {
        ic_cdk::spawn(async {
            if let Err(e) = utils::rng::initialize_internal_rng().await {
                log_error!("RNG: seeding failed: {}", e);
                return;
            }
            if let Err(e) = state::ensure_signing_key().await {
                log_error!("TOKEN: signing key unavailable: {}", e);
            }
        })
    });
}

#[ic_cdk::init]
fn init(args: InitArgs) {
    if let Err(e) = args.validate() {
        ic_cdk::trap(&format!("Invalid init arguments: {}", e));
    }
    let config = LockerConfig::from(&args);
    if let Err(e) = init_config(config.clone()) {
        ic_cdk::trap(&format!("Failed to store config: {}", e));
    }
    start_background_tasks(&config);
    log_info!("Locker backend initialized. Admin: {}", config.admin_principal);
}

#[ic_cdk::post_upgrade]
fn post_upgrade() {
    let config = get_config();
    start_background_tasks(&config);
    log_info!("Locker backend upgraded.");
}

// Export Candid interface
ic_cdk::export_candid!();
