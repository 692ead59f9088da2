// src/backend/services/fulfillment_service.rs
//! Order lifecycle: warehouse intake and the at-most-once pickup commit.

use crate::adapter::{Clock, Notifier, OrderLedger, PickupCache};
use crate::error::LockerError;
use crate::metrics;
use crate::models::{
    AccessScope, AuthorizationResult, CommitOutcome, ConfirmOutcome, DenialReason, NewOrder, Order,
    OrderId, ReadyForPickup, ScanOutcome, UserId,
};
use crate::services::effects::PickupEffects;
use crate::services::resolver::AuthorizationResolver;
use crate::services::token_service::TokenService;
use crate::storage::ReadyForPickupCache;
use crate::utils::crypto::fingerprint;
use std::rc::Rc;

pub struct FulfillmentService {
    ledger: Rc<dyn OrderLedger>,
    resolver: Rc<AuthorizationResolver>,
    tokens: Rc<TokenService>,
    effects: Rc<PickupEffects>,
    notifier: Rc<dyn Notifier>,
    ready_cache: Rc<ReadyForPickupCache>,
    clock: Rc<dyn Clock>,
}

#[derive(Clone, Copy, Debug)]
enum IntakeStep {
    Shipped,
    Delivered,
    Processed,
}

fn ensure_in_scope(scope: &AccessScope, order: &Order) -> Result<(), LockerError> {
    if scope.covers(order.location_id) {
        Ok(())
    } else {
        Err(LockerError::NotAuthorized(format!(
            "Staff member has no access to location {}",
            order.location_id
        )))
    }
}

impl FulfillmentService {
    pub fn new(
        ledger: Rc<dyn OrderLedger>,
        resolver: Rc<AuthorizationResolver>,
        tokens: Rc<TokenService>,
        effects: Rc<PickupEffects>,
        notifier: Rc<dyn Notifier>,
        ready_cache: Rc<ReadyForPickupCache>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            resolver,
            tokens,
            effects,
            notifier,
            ready_cache,
            clock,
        }
    }

    /// Marks the order collected by `subject_id`, at most once.
    ///
    /// Authorization is re-resolved here regardless of any earlier scan. The
    /// write itself is conditional on `picked_up_at` still being empty; a
    /// commit that loses that race reports `AlreadyPickedUp`.
    pub async fn commit_pickup(
        &self,
        order_id: OrderId,
        subject_id: UserId,
        scope: &AccessScope,
    ) -> Result<CommitOutcome, LockerError> {
        self.ensure_location_access(order_id, scope).await?;
        let order = match self.resolver.resolve(order_id, subject_id).await? {
            AuthorizationResult::Denied { reason } => {
                log_info!(
                    "PICKUP: commit denied for order {} subject {}: {:?}",
                    order_id,
                    subject_id,
                    reason
                );
                return Ok(CommitOutcome::Denied { reason });
            }
            AuthorizationResult::Authorized { order, .. } => order,
        };

        let now = self.clock.now();
        let rows = self
            .ledger
            .conditional_mark_picked_up(order_id, now, subject_id)
            .await?;
        if rows == 0 {
            log_warn!(
                "PICKUP: order {} already collected when subject {} committed",
                order_id,
                subject_id
            );
            metrics::record_race_lost();
            return Ok(CommitOutcome::Denied {
                reason: DenialReason::AlreadyPickedUp,
            });
        }

        // Same values the conditional write stored.
        let picked_up_at = order.delivered_date.map_or(now, |delivered| now.max(delivered));
        let committed = Order {
            picked_up_at: Some(picked_up_at),
            collected_by: Some(subject_id),
            ..order
        };
        log_info!(
            "PICKUP: order {} collected by {} at {}",
            order_id,
            subject_id,
            picked_up_at
        );

        let report = self.effects.emit(&committed).await;
        metrics::record_effect_failures(u64::from(report.failed));

        Ok(CommitOutcome::Success {
            order_id,
            picked_up_at,
            collected_by: subject_id,
        })
    }

    /// Attendant scan: validate the token, then resolve. Read-only.
    pub async fn scan(&self, token: &str, scope: &AccessScope) -> Result<ScanOutcome, LockerError> {
        let claims = match self.tokens.validate(token) {
            Ok(claims) => claims,
            Err(rejection) => {
                log_info!("PICKUP: scan of {} rejected: {:?}", fingerprint(token), rejection);
                return Ok(ScanOutcome::TokenRejected(rejection));
            }
        };
        self.ensure_location_access(claims.order_id, scope).await?;
        let result = self.resolver.resolve(claims.order_id, claims.subject_id).await?;
        log_info!(
            "PICKUP: scan of order {} subject {} -> {}",
            claims.order_id,
            claims.subject_id,
            match result.denial_reason() {
                Some(reason) => format!("{:?}", reason),
                None => "Authorized".to_string(),
            }
        );
        Ok(ScanOutcome::Resolved(result))
    }

    /// Attendant confirmation: the token is validated again, then committed.
    pub async fn confirm(&self, token: &str, scope: &AccessScope) -> Result<ConfirmOutcome, LockerError> {
        match self.tokens.validate(token) {
            Ok(claims) => Ok(ConfirmOutcome::Committed(
                self.commit_pickup(claims.order_id, claims.subject_id, scope).await?,
            )),
            Err(rejection) => {
                log_info!("PICKUP: confirm of {} rejected: {:?}", fingerprint(token), rejection);
                Ok(ConfirmOutcome::TokenRejected(rejection))
            }
        }
    }

    // --- Intake ---

    pub async fn place_order(&self, order: NewOrder, scope: &AccessScope) -> Result<Order, LockerError> {
        if !scope.covers(order.location_id) {
            return Err(LockerError::NotAuthorized(format!(
                "Staff member has no access to location {}",
                order.location_id
            )));
        }
        let placed = self.ledger.place_order(order, self.clock.now()).await?;
        log_info!(
            "INTAKE: order {} placed for customer {} at location {}",
            placed.order_id,
            placed.customer_id,
            placed.location_id
        );
        Ok(placed)
    }

    pub async fn mark_shipped(&self, order_id: OrderId, scope: &AccessScope) -> Result<Order, LockerError> {
        self.intake_step(order_id, scope, IntakeStep::Shipped).await
    }

    /// Records arrival at the locker location and tells the customer.
    pub async fn mark_delivered(&self, order_id: OrderId, scope: &AccessScope) -> Result<Order, LockerError> {
        let order = self
            .intake_step(order_id, scope, IntakeStep::Delivered)
            .await?;
        if let Err(e) = self.ready_cache.invalidate(order.customer_id).await {
            log_warn!("INTAKE: cache invalidation failed for order {}: {}", order_id, e);
        }
        let message = format!("Your package {} is ready for pickup.", order.vendor_reference);
        if let Err(e) = self
            .notifier
            .notify(order.customer_id, Some(order_id), message)
            .await
        {
            log_warn!("INTAKE: delivery notification failed for order {}: {}", order_id, e);
        }
        Ok(order)
    }

    pub async fn mark_processed(&self, order_id: OrderId, scope: &AccessScope) -> Result<Order, LockerError> {
        self.intake_step(order_id, scope, IntakeStep::Processed).await
    }

    pub async fn orders_of(&self, customer_id: UserId) -> Result<Vec<Order>, LockerError> {
        self.ledger.orders_for_customer(customer_id).await
    }

    /// Orders of `customer_id` waiting at a locker, served from the heap cache.
    pub async fn ready_for_pickup(&self, customer_id: UserId) -> Result<Vec<ReadyForPickup>, LockerError> {
        if let Some(ready) = self.ready_cache.get(customer_id) {
            return Ok(ready);
        }
        let ready: Vec<ReadyForPickup> = self
            .ledger
            .orders_for_customer(customer_id)
            .await?
            .iter()
            .filter_map(ReadyForPickup::from_order)
            .collect();
        self.ready_cache.fill(customer_id, ready.clone());
        Ok(ready)
    }

    /// Staff outside the order's location learn nothing about its state.
    /// Unknown orders are left to the resolver.
    async fn ensure_location_access(&self, order_id: OrderId, scope: &AccessScope) -> Result<(), LockerError> {
        if let AccessScope::AllLocations = scope {
            return Ok(());
        }
        match self.ledger.find_order(order_id).await? {
            Some(order) => ensure_in_scope(scope, &order),
            None => Ok(()),
        }
    }

    async fn intake_step(&self, order_id: OrderId, scope: &AccessScope, step: IntakeStep) -> Result<Order, LockerError> {
        let order = self
            .ledger
            .find_order(order_id)
            .await?
            .ok_or(LockerError::OrderNotFound(order_id))?;
        ensure_in_scope(scope, &order)?;

        let now = self.clock.now();
        let rows = match step {
            IntakeStep::Shipped => self.ledger.mark_shipped(order_id, now).await?,
            IntakeStep::Delivered => self.ledger.mark_delivered(order_id, now).await?,
            IntakeStep::Processed => self.ledger.mark_processed(order_id, now).await?,
        };
        if rows == 0 {
            return Err(LockerError::InvalidState(format!(
                "Order {} cannot be marked {:?} in stage {:?}",
                order_id,
                step,
                order.stage()
            )));
        }
        log_info!("INTAKE: order {} marked {:?}", order_id, step);
        self.ledger
            .find_order(order_id)
            .await?
            .ok_or(LockerError::OrderNotFound(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStage, Timestamp, TokenRejection};
    use crate::services::test_support::{counter_scope, TestWorld, ALICE, CAROL};
    use crate::storage::StableOrderLedger;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use futures::future::join_all;
    use std::cell::Cell;

    /// Ledger whose reads fail once a pickup has been written.
    struct UnreadableAfterPickup {
        inner: Rc<StableOrderLedger>,
        written: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl OrderLedger for UnreadableAfterPickup {
        async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, LockerError> {
            if self.written.get() {
                return Err(LockerError::StorageError("ledger read failed".to_string()));
            }
            self.inner.find_order(order_id).await
        }

        async fn place_order(&self, order: NewOrder, at: Timestamp) -> Result<Order, LockerError> {
            self.inner.place_order(order, at).await
        }

        async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, LockerError> {
            self.inner.orders_for_customer(customer_id).await
        }

        async fn mark_shipped(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
            self.inner.mark_shipped(order_id, at).await
        }

        async fn mark_delivered(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
            self.inner.mark_delivered(order_id, at).await
        }

        async fn mark_processed(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
            self.inner.mark_processed(order_id, at).await
        }

        async fn conditional_mark_picked_up(
            &self,
            order_id: OrderId,
            at: Timestamp,
            collected_by: UserId,
        ) -> Result<u64, LockerError> {
            let rows = self.inner.conditional_mark_picked_up(order_id, at, collected_by).await?;
            self.written.set(rows > 0);
            Ok(rows)
        }
    }

    #[test]
    fn concurrent_commits_succeed_exactly_once() {
        let world = TestWorld::with_yielding_reads();
        let alice = world.customer(ALICE);
        let order_id = world.delivered_order(alice);
        let scope = counter_scope();
        let fulfillment = &world.services.fulfillment;

        let outcomes = block_on(join_all(
            (0..8).map(|_| fulfillment.commit_pickup(order_id, alice, &scope)),
        ));
        let outcomes: Vec<CommitOutcome> = outcomes.into_iter().map(|o| o.unwrap()).collect();
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| o.denial_reason() == Some(DenialReason::AlreadyPickedUp))
                .count(),
            7
        );

        let first_picked_up = world.order(order_id).picked_up_at;
        world.clock.advance(1_000);
        let again = block_on(fulfillment.commit_pickup(order_id, alice, &scope)).unwrap();
        assert_eq!(again.denial_reason(), Some(DenialReason::AlreadyPickedUp));
        assert_eq!(world.order(order_id).picked_up_at, first_picked_up);
        // Side effects ran for the single winner only.
        assert_eq!(world.usage.page(0, 10).1, 1);
    }

    #[test]
    fn undelivered_orders_are_never_committed() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let order = block_on(world.services.fulfillment.place_order(
            NewOrder {
                vendor_reference: "VND-U".to_string(),
                customer_id: alice,
                location_id: 1,
            },
            &counter_scope(),
        ))
        .unwrap();
        let outcome = block_on(world.services.fulfillment.commit_pickup(order.order_id, alice, &AccessScope::AllLocations)).unwrap();
        assert_eq!(outcome.denial_reason(), Some(DenialReason::NotYetDelivered));
        assert!(world.order(order.order_id).picked_up_at.is_none());
    }

    #[test]
    fn unauthorized_subject_leaves_order_untouched() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let carol = world.customer(CAROL);
        let order_id = world.delivered_order(alice);
        let outcome = block_on(world.services.fulfillment.commit_pickup(order_id, carol, &counter_scope())).unwrap();
        assert_eq!(outcome.denial_reason(), Some(DenialReason::NotAuthorized));
        assert_eq!(world.order(order_id).stage(), OrderStage::Delivered);
    }

    #[test]
    fn attendant_outside_location_cannot_commit() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let order_id = world.delivered_order(alice);
        let elsewhere = AccessScope::LocationSet([2].into_iter().collect());
        assert!(matches!(
            block_on(world.services.fulfillment.commit_pickup(order_id, alice, &elsewhere)),
            Err(LockerError::NotAuthorized(_))
        ));
        assert!(world.order(order_id).picked_up_at.is_none());
    }

    #[test]
    fn trusted_contact_commit_records_collector() {
        let world = TestWorld::new();
        let (alice, bob) = world.accepted_pair();
        let order_id = world.delivered_order(alice);
        block_on(world.services.delegation.set_sharing(alice, order_id, bob, true)).unwrap();

        let outcome = block_on(world.services.fulfillment.commit_pickup(order_id, bob, &counter_scope())).unwrap();
        match outcome {
            CommitOutcome::Success { collected_by, .. } => assert_eq!(collected_by, bob),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(world.order(order_id).collected_by, Some(bob));
        assert_eq!(world.inbox.inbox(bob).len(), 1);
    }

    #[test]
    fn scan_and_confirm_validate_the_token_first() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let order_id = world.delivered_order(alice);
        let scope = counter_scope();
        let token = block_on(world.services.tokens.issue(order_id, alice)).unwrap().token;
        let fulfillment = &world.services.fulfillment;

        assert_eq!(
            block_on(fulfillment.scan("garbage", &scope)).unwrap(),
            ScanOutcome::TokenRejected(TokenRejection::Malformed)
        );
        let scanned = block_on(fulfillment.scan(&token, &scope)).unwrap();
        assert!(matches!(scanned, ScanOutcome::Resolved(ref r) if r.is_authorized()));

        let confirmed = block_on(fulfillment.confirm(&token, &scope)).unwrap();
        assert!(matches!(confirmed, ConfirmOutcome::Committed(ref c) if c.is_success()));
        let replay = block_on(fulfillment.confirm(&token, &scope)).unwrap();
        assert_eq!(
            replay,
            ConfirmOutcome::Committed(CommitOutcome::Denied {
                reason: DenialReason::AlreadyPickedUp
            })
        );

        world.clock.advance(crate::models::secs_to_nanos(3600));
        assert_eq!(
            block_on(fulfillment.confirm(&token, &scope)).unwrap(),
            ConfirmOutcome::TokenRejected(TokenRejection::Expired)
        );
    }

    #[test]
    fn intake_steps_are_set_once_and_refresh_ready_list() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let scope = counter_scope();
        let fulfillment = &world.services.fulfillment;
        let order = block_on(fulfillment.place_order(
            NewOrder {
                vendor_reference: "VND-I".to_string(),
                customer_id: alice,
                location_id: 1,
            },
            &scope,
        ))
        .unwrap();

        assert!(block_on(fulfillment.ready_for_pickup(alice)).unwrap().is_empty());
        block_on(fulfillment.mark_shipped(order.order_id, &scope)).unwrap();
        let delivered = block_on(fulfillment.mark_delivered(order.order_id, &scope)).unwrap();
        assert_eq!(delivered.stage(), OrderStage::Delivered);
        assert!(matches!(
            block_on(fulfillment.mark_delivered(order.order_id, &scope)),
            Err(LockerError::InvalidState(_))
        ));
        block_on(fulfillment.mark_processed(order.order_id, &scope)).unwrap();

        let ready = block_on(fulfillment.ready_for_pickup(alice)).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(world.inbox.inbox(alice).len(), 1);

        block_on(fulfillment.commit_pickup(order.order_id, alice, &scope)).unwrap();
        assert!(block_on(fulfillment.ready_for_pickup(alice)).unwrap().is_empty());
    }

    #[test]
    fn intake_outside_scope_is_rejected() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let elsewhere = AccessScope::LocationSet([9].into_iter().collect());
        assert!(matches!(
            block_on(world.services.fulfillment.place_order(
                NewOrder {
                    vendor_reference: "VND-X".to_string(),
                    customer_id: alice,
                    location_id: 1,
                },
                &elsewhere,
            )),
            Err(LockerError::NotAuthorized(_))
        ));
        assert_eq!(
            block_on(world.services.fulfillment.mark_delivered(404, &elsewhere)),
            Err(LockerError::OrderNotFound(404))
        );
    }

    #[test]
    fn committed_pickup_reports_success_without_rereading_the_order() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let order_id = world.delivered_order(alice);
        let fulfillment = FulfillmentService::new(
            Rc::new(UnreadableAfterPickup {
                inner: world.ledger.clone(),
                written: Cell::new(false),
            }),
            world.services.resolver.clone(),
            world.services.tokens.clone(),
            world.services.effects.clone(),
            world.inbox.clone(),
            world.cache.clone(),
            world.clock.clone(),
        );

        let outcome = block_on(fulfillment.commit_pickup(order_id, alice, &counter_scope())).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Success {
                order_id,
                picked_up_at: world.now(),
                collected_by: alice,
            }
        );
        assert_eq!(world.order(order_id).picked_up_at, Some(world.now()));
        assert!(block_on(world.services.effects.record(order_id)).unwrap().is_complete());
        assert_eq!(world.usage.page(0, 10).1, 1);
    }

    #[test]
    fn out_of_scope_scan_reveals_nothing_about_the_order() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let fulfillment = &world.services.fulfillment;
        let elsewhere = AccessScope::LocationSet([2].into_iter().collect());

        let collected = world.delivered_order(alice);
        let token = block_on(world.services.tokens.issue(collected, alice)).unwrap().token;
        block_on(fulfillment.commit_pickup(collected, alice, &counter_scope())).unwrap();
        assert!(matches!(
            block_on(fulfillment.scan(&token, &elsewhere)),
            Err(LockerError::NotAuthorized(_))
        ));
        assert!(matches!(
            block_on(fulfillment.commit_pickup(collected, alice, &elsewhere)),
            Err(LockerError::NotAuthorized(_))
        ));

        let pending = block_on(fulfillment.place_order(
            NewOrder {
                vendor_reference: "VND-P".to_string(),
                customer_id: alice,
                location_id: 1,
            },
            &counter_scope(),
        ))
        .unwrap();
        let token = block_on(world.services.tokens.issue(pending.order_id, alice)).unwrap().token;
        assert!(matches!(
            block_on(fulfillment.scan(&token, &elsewhere)),
            Err(LockerError::NotAuthorized(_))
        ));
        assert_eq!(
            block_on(fulfillment.scan(&token, &counter_scope())).unwrap(),
            ScanOutcome::Resolved(AuthorizationResult::denied(DenialReason::NotYetDelivered))
        );
    }
}
