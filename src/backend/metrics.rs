// src/backend/metrics.rs
use crate::models::{
    CommitOutcome, ConfirmOutcome, InvitationOutcome, ScanOutcome, ShareToggle, Timestamp,
};
use crate::storage::metrics::{get_metrics, update_metrics};
use candid::CandidType;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LockerMetrics {
    pub tokens_issued: u64,
    pub tokens_rejected: u64,
    pub scans_authorized: u64,
    pub scans_denied: u64,
    pub pickups_committed: u64,
    pub pickup_races_lost: u64,
    pub invitations_created: u64,
    pub invitations_converted: u64,
    pub share_grants_created: u64,
    pub effects_failed: u64,
    pub maintenance_last_run: Option<Timestamp>,
}

// --- Metrics Update Helpers ---
// Counters are best effort: a failed write is logged and never fails the call.

fn bump<F>(what: &str, update_fn: F)
where
    F: FnOnce(&mut LockerMetrics),
{
    if let Err(e) = update_metrics(update_fn) {
        log_warn!("METRICS: failed to record {}: {}", what, e);
    }
}

pub fn record_token_issued() {
    bump("token issue", |m| m.tokens_issued = m.tokens_issued.saturating_add(1));
}

pub fn record_scan(outcome: &ScanOutcome) {
    bump("scan", |m| match outcome {
        ScanOutcome::TokenRejected(_) => m.tokens_rejected = m.tokens_rejected.saturating_add(1),
        ScanOutcome::Resolved(result) if result.is_authorized() => {
            m.scans_authorized = m.scans_authorized.saturating_add(1)
        }
        ScanOutcome::Resolved(_) => m.scans_denied = m.scans_denied.saturating_add(1),
    });
}

pub fn record_confirm(outcome: &ConfirmOutcome) {
    bump("confirm", |m| match outcome {
        ConfirmOutcome::TokenRejected(_) => m.tokens_rejected = m.tokens_rejected.saturating_add(1),
        ConfirmOutcome::Committed(CommitOutcome::Success { .. }) => {
            m.pickups_committed = m.pickups_committed.saturating_add(1)
        }
        ConfirmOutcome::Committed(CommitOutcome::Denied { .. }) => {}
    });
}

/// Counts a commit that passed resolution but lost the conditional write.
pub fn record_race_lost() {
    bump("lost race", |m| m.pickup_races_lost = m.pickup_races_lost.saturating_add(1));
}

pub fn record_invitation(outcome: &InvitationOutcome) {
    if matches!(outcome, InvitationOutcome::AlreadyInvited(_)) {
        return;
    }
    bump("invitation", |m| m.invitations_created = m.invitations_created.saturating_add(1));
}

pub fn record_invitations_converted(count: u32) {
    if count == 0 {
        return;
    }
    bump("invitation conversion", |m| {
        m.invitations_converted = m.invitations_converted.saturating_add(u64::from(count))
    });
}

pub fn record_share_toggle(toggle: ShareToggle) {
    if toggle != ShareToggle::Granted {
        return;
    }
    bump("share grant", |m| m.share_grants_created = m.share_grants_created.saturating_add(1));
}

pub fn record_effect_failures(count: u64) {
    if count == 0 {
        return;
    }
    bump("effect failure", |m| m.effects_failed = m.effects_failed.saturating_add(count));
}

pub fn record_maintenance_run(at: Timestamp) {
    bump("maintenance run", |m| m.maintenance_last_run = Some(at));
}

pub fn get_locker_metrics() -> LockerMetrics {
    get_metrics()
}
