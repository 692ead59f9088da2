// src/backend/services/scheduler.rs
// Periodic maintenance, driven by an ic-cdk-timers interval.

use crate::error::LockerError;
use crate::models::{secs_to_nanos, Timestamp};
use crate::services::LockerServices;
use crate::storage::ReadyForPickupCache;
use candid::CandidType;
use serde::Deserialize;
use std::time::Duration;

/// Orders whose pending effects are retried per run.
pub const EFFECT_RETRY_BATCH: usize = 50;

#[derive(CandidType, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub effects_delivered: u32,
    pub effects_failed: u32,
    pub invitations_purged: u64,
    pub cache_entries_dropped: u64,
}

/// Retries pending pickup effects, purges consumed invitations older than
/// the retention window and drops the ready-for-pickup cache.
pub async fn perform_maintenance(
    services: &LockerServices,
    ready_cache: &ReadyForPickupCache,
    now: Timestamp,
    invitation_retention_secs: u64,
) -> Result<MaintenanceReport, LockerError> {
    log_info!("SCHEDULER: starting maintenance at {}", now);

    let effects = services.effects.retry_pending(EFFECT_RETRY_BATCH).await;
    let cutoff = now.saturating_sub(secs_to_nanos(invitation_retention_secs));
    let invitations_purged = services.delegation.purge_processed_invitations(cutoff).await?;
    let cache_entries_dropped = ready_cache.clear() as u64;

    let report = MaintenanceReport {
        effects_delivered: effects.delivered,
        effects_failed: effects.failed,
        invitations_purged,
        cache_entries_dropped,
    };
    log_info!("SCHEDULER: maintenance completed: {:?}", report);
    Ok(report)
}

/// Starts the maintenance interval timer.
pub fn start_maintenance_timer(interval_secs: u64) -> ic_cdk_timers::TimerId {
    ic_cdk_timers::set_timer_interval(Duration::from_secs(interval_secs), || {
        ic_cdk::spawn(async {
            match crate::state::run_maintenance().await {
                Ok(_) => {}
                Err(e) if e.is_transient() => log_warn!("SCHEDULER: maintenance deferred: {}", e),
                Err(e) => log_error!("SCHEDULER: maintenance failed: {}", e),
            }
        })
    })
}
