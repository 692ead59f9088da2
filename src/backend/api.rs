// src/backend/api.rs
// Candid endpoint definitions (query/update functions)

use crate::{
    error::LockerError,
    metrics::{self, LockerMetrics},
    models::{
        normalize_email, ConfirmOutcome, InvitationOutcome, IssuedToken, LocationId, NewOrder, Notification,
        Order, OrderId, ReadyForPickup, ScanOutcome, ShareGrant, ShareToggle, StaffMember, StaffRole,
        TrustedContactRelationship, UsageEvent, UserId, UserProfile,
    },
    services::access_service::{staff_context, StaffContext},
    services::scheduler::MaintenanceReport,
    services::token_service::TokenPolicy,
    state::{self, with_state},
    storage::config::{get_admin_principal, update_config},
    storage::NewProfile,
    utils::guards::{admin_guard, check_not_anonymous, not_anonymous_guard, staff_guard},
    utils::rate_limit::{check_issue_rate, check_scan_rate},
    utils::time::get_current_time_ns,
};
use candid::{CandidType, Deserialize, Principal};
use ic_cdk::caller;
use ic_cdk_macros::{query, update};
use validator::Validate;

// --- Validation Helper ---
fn validate_request<T: Validate>(req: &T) -> Result<(), LockerError> {
    req.validate().map_err(LockerError::from)
}

/// Customer id of the calling principal.
fn current_customer() -> Result<UserId, LockerError> {
    let caller = caller();
    check_not_anonymous(caller)?;
    state::customer_id(&caller)
}

/// Staff capabilities of the calling principal, resolved once per request.
fn current_staff() -> Result<StaffContext, LockerError> {
    let caller = caller();
    with_state(|s| staff_context(&s.staff, get_admin_principal(), caller))
}

// --- Request/Response Structs ---

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct RegisterCustomerRequest {
    #[validate(email, length(max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub legal_name: String,
    #[validate(url, length(max = 2048))]
    pub photo_url: Option<String>,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct InviteContactRequest {
    #[validate(length(min = 3, max = 254))]
    pub email: String,
}

#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct RevokeContactRequest {
    pub account_holder_id: UserId,
    pub trusted_contact_id: UserId,
}

#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct SetSharingRequest {
    pub order_id: OrderId,
    pub trusted_contact_id: UserId,
    pub enabled: bool,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct PickupTokenRequest {
    #[validate(length(min = 1, max = 512))]
    pub token: String,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, max = 64))]
    pub vendor_reference: String,
    pub customer_id: UserId,
    pub location_id: LocationId,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct RegisterStaffRequest {
    pub principal: Principal,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    pub role: StaffRole,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct SetTokenTtlRequest {
    #[validate(range(min = 30, max = 3600))]
    pub ttl_secs: u64,
    #[validate(range(min = 5, max = 600))]
    pub refresh_secs: Option<u64>,
}

#[derive(CandidType, Deserialize, Validate)]
pub struct ListRequest {
    pub offset: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

#[derive(CandidType, Deserialize, Clone, Debug, Default)]
pub struct ListUsageResponse {
    pub events: Vec<UsageEvent>,
    pub total: u64,
}

#[derive(CandidType, Deserialize, Clone, Debug, Default)]
pub struct GetMetricsResponse {
    pub metrics: LockerMetrics,
    pub cycle_balance: u128,
}

// --- Customer Endpoints ---

#[update(guard = "not_anonymous_guard")]
async fn register_customer(req: RegisterCustomerRequest) -> Result<UserProfile, LockerError> {
    validate_request(&req)?;
    let caller = caller();
    let email = normalize_email(&req.email);
    let profile = with_state(|s| {
        s.users.register(
            NewProfile {
                principal: caller,
                email: email.clone(),
                legal_name: req.legal_name.trim().to_string(),
                photo_url: req.photo_url,
            },
            get_current_time_ns(),
        )
    })?;
    log_info!("API: registered customer {} for {}", profile.user_id, caller);

    let converted = state::services()
        .delegation
        .handle_account_created(profile.user_id, &email)
        .await?;
    metrics::record_invitations_converted(converted);
    Ok(profile)
}

#[query(guard = "not_anonymous_guard")]
fn my_profile() -> Result<UserProfile, LockerError> {
    let caller = caller();
    check_not_anonymous(caller)?;
    with_state(|s| s.users.profile_for_principal(&caller))
        .ok_or_else(|| LockerError::NotFound("Profile not found".to_string()))
}

#[query(guard = "not_anonymous_guard")]
async fn my_orders() -> Result<Vec<Order>, LockerError> {
    let user_id = current_customer()?;
    state::services().fulfillment.orders_of(user_id).await
}

#[query(guard = "not_anonymous_guard")]
async fn ready_for_pickup() -> Result<Vec<ReadyForPickup>, LockerError> {
    let user_id = current_customer()?;
    state::services().fulfillment.ready_for_pickup(user_id).await
}

#[update(guard = "not_anonymous_guard")]
async fn issue_pickup_token(order_id: OrderId) -> Result<IssuedToken, LockerError> {
    let user_id = current_customer()?;
    check_issue_rate(caller(), get_current_time_ns())?;
    let issued = state::services().tokens.issue(order_id, user_id).await?;
    metrics::record_token_issued();
    Ok(issued)
}

#[update(guard = "not_anonymous_guard")]
async fn invite_trusted_contact(req: InviteContactRequest) -> Result<InvitationOutcome, LockerError> {
    validate_request(&req)?;
    let user_id = current_customer()?;
    let outcome = state::services().delegation.invite(user_id, &req.email).await?;
    metrics::record_invitation(&outcome);
    Ok(outcome)
}

#[update(guard = "not_anonymous_guard")]
async fn accept_trusted_contact(account_holder_id: UserId) -> Result<TrustedContactRelationship, LockerError> {
    let user_id = current_customer()?;
    state::services().delegation.accept(account_holder_id, user_id).await
}

#[update(guard = "not_anonymous_guard")]
async fn revoke_trusted_contact(req: RevokeContactRequest) -> Result<TrustedContactRelationship, LockerError> {
    let user_id = current_customer()?;
    state::services()
        .delegation
        .revoke(req.account_holder_id, req.trusted_contact_id, user_id)
        .await
}

#[update(guard = "not_anonymous_guard")]
async fn set_order_sharing(req: SetSharingRequest) -> Result<ShareToggle, LockerError> {
    let user_id = current_customer()?;
    let toggle = state::services()
        .delegation
        .set_sharing(user_id, req.order_id, req.trusted_contact_id, req.enabled)
        .await?;
    metrics::record_share_toggle(toggle);
    Ok(toggle)
}

#[query(guard = "not_anonymous_guard")]
async fn my_trusted_contacts() -> Result<Vec<TrustedContactRelationship>, LockerError> {
    let user_id = current_customer()?;
    state::services().delegation.contacts_of(user_id).await
}

#[query(guard = "not_anonymous_guard")]
async fn contacts_trusting_me() -> Result<Vec<TrustedContactRelationship>, LockerError> {
    let user_id = current_customer()?;
    state::services().delegation.holders_trusting(user_id).await
}

#[query(guard = "not_anonymous_guard")]
async fn order_shares(order_id: OrderId) -> Result<Vec<ShareGrant>, LockerError> {
    let user_id = current_customer()?;
    state::services().delegation.shares_for_order(user_id, order_id).await
}

#[query(guard = "not_anonymous_guard")]
async fn orders_shared_with_me() -> Result<Vec<Order>, LockerError> {
    let user_id = current_customer()?;
    state::services().delegation.orders_shared_with(user_id).await
}

#[query(guard = "not_anonymous_guard")]
fn my_notifications() -> Result<Vec<Notification>, LockerError> {
    let user_id = current_customer()?;
    Ok(with_state(|s| s.inbox.inbox(user_id)))
}

// --- Staff Endpoints ---

#[update(guard = "staff_guard")]
async fn scan_pickup_token(req: PickupTokenRequest) -> Result<ScanOutcome, LockerError> {
    validate_request(&req)?;
    let staff = current_staff()?;
    check_scan_rate(staff.principal, get_current_time_ns())?;
    let outcome = state::services().fulfillment.scan(&req.token, &staff.scope).await?;
    metrics::record_scan(&outcome);
    Ok(outcome.for_attendant())
}

#[update(guard = "staff_guard")]
async fn confirm_pickup(req: PickupTokenRequest) -> Result<ConfirmOutcome, LockerError> {
    validate_request(&req)?;
    let staff = current_staff()?;
    check_scan_rate(staff.principal, get_current_time_ns())?;
    let outcome = state::services().fulfillment.confirm(&req.token, &staff.scope).await?;
    metrics::record_confirm(&outcome);
    Ok(outcome.for_attendant())
}

#[update(guard = "staff_guard")]
async fn place_order(req: PlaceOrderRequest) -> Result<Order, LockerError> {
    validate_request(&req)?;
    let staff = current_staff()?;
    staff.require_intake()?;
    state::services()
        .fulfillment
        .place_order(
            NewOrder {
                vendor_reference: req.vendor_reference.trim().to_string(),
                customer_id: req.customer_id,
                location_id: req.location_id,
            },
            &staff.scope,
        )
        .await
}

#[update(guard = "staff_guard")]
async fn mark_order_shipped(order_id: OrderId) -> Result<Order, LockerError> {
    let staff = current_staff()?;
    staff.require_intake()?;
    state::services().fulfillment.mark_shipped(order_id, &staff.scope).await
}

#[update(guard = "staff_guard")]
async fn mark_order_delivered(order_id: OrderId) -> Result<Order, LockerError> {
    let staff = current_staff()?;
    staff.require_intake()?;
    state::services().fulfillment.mark_delivered(order_id, &staff.scope).await
}

#[update(guard = "staff_guard")]
async fn mark_order_processed(order_id: OrderId) -> Result<Order, LockerError> {
    let staff = current_staff()?;
    staff.require_intake()?;
    state::services().fulfillment.mark_processed(order_id, &staff.scope).await
}

// --- Admin Endpoints ---

#[update(guard = "admin_guard")]
fn register_staff(req: RegisterStaffRequest) -> Result<StaffMember, LockerError> {
    validate_request(&req)?;
    check_not_anonymous(req.principal)?;
    let member = StaffMember {
        principal: req.principal,
        display_name: req.display_name.trim().to_string(),
        role: req.role,
        added_at: get_current_time_ns(),
    };
    let replaced = with_state(|s| s.staff.upsert(member.clone()));
    log_info!(
        "API: staff {} registered as {:?} (replaced existing: {})",
        member.principal,
        member.role,
        replaced.is_some()
    );
    Ok(member)
}

#[update(guard = "admin_guard")]
fn remove_staff(principal: Principal) -> Result<StaffMember, LockerError> {
    let removed = with_state(|s| s.staff.remove(&principal))?;
    log_info!("API: staff {} removed", principal);
    Ok(removed)
}

#[query(guard = "admin_guard")]
fn list_staff() -> Result<Vec<StaffMember>, LockerError> {
    Ok(with_state(|s| s.staff.list()))
}

#[update(guard = "admin_guard")]
fn set_token_ttl(req: SetTokenTtlRequest) -> Result<(), LockerError> {
    validate_request(&req)?;
    let services = state::services();
    let refresh_secs = req.refresh_secs.unwrap_or(services.tokens.policy().refresh_secs);
    let policy = TokenPolicy::checked(req.ttl_secs, refresh_secs)?;
    update_config(|config| {
        config.token_ttl_secs = policy.ttl_secs;
        config.token_refresh_secs = policy.refresh_secs;
    })?;
    services.tokens.set_policy(policy);
    log_info!(
        "API: token policy set to ttl={}s refresh={}s",
        policy.ttl_secs,
        policy.refresh_secs
    );
    Ok(())
}

#[query(guard = "admin_guard")]
fn get_metrics() -> Result<GetMetricsResponse, LockerError> {
    Ok(GetMetricsResponse {
        metrics: metrics::get_locker_metrics(),
        cycle_balance: ic_cdk::api::canister_balance128(),
    })
}

#[query(guard = "admin_guard")]
fn list_usage_events(req: ListRequest) -> Result<ListUsageResponse, LockerError> {
    validate_request(&req)?;
    let offset = req.offset.unwrap_or(0);
    let limit = req.limit.unwrap_or(20) as usize;
    let (events, total) = with_state(|s| s.usage.page(offset, limit));
    Ok(ListUsageResponse { events, total })
}

#[update(guard = "admin_guard")]
async fn run_maintenance() -> Result<MaintenanceReport, LockerError> {
    state::run_maintenance().await
}
