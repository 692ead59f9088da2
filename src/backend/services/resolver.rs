// src/backend/services/resolver.rs
use crate::adapter::{IdentityProvider, OrderLedger};
use crate::error::LockerError;
use crate::models::{AuthorizationBasis, AuthorizationResult, DenialReason, OrderId, UserId};
use crate::services::delegation_service::DelegationService;
use std::rc::Rc;

/// Decides whether a subject may collect an order right now.
///
/// Checks run in a fixed order and the first failing one is reported:
/// existence, already picked up, not yet delivered, then ownership or an
/// active share grant. Collaborator errors propagate; they never turn into
/// a denial.
pub struct AuthorizationResolver {
    ledger: Rc<dyn OrderLedger>,
    delegation: Rc<DelegationService>,
    identity: Rc<dyn IdentityProvider>,
}

impl AuthorizationResolver {
    pub fn new(
        ledger: Rc<dyn OrderLedger>,
        delegation: Rc<DelegationService>,
        identity: Rc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            ledger,
            delegation,
            identity,
        }
    }

    pub async fn resolve(&self, order_id: OrderId, subject_id: UserId) -> Result<AuthorizationResult, LockerError> {
        let Some(order) = self.ledger.find_order(order_id).await? else {
            return Ok(AuthorizationResult::denied(DenialReason::OrderNotFound));
        };
        if order.picked_up_at.is_some() {
            return Ok(AuthorizationResult::denied(DenialReason::AlreadyPickedUp));
        }
        if order.delivered_date.is_none() {
            return Ok(AuthorizationResult::denied(DenialReason::NotYetDelivered));
        }

        let basis = if order.customer_id == subject_id {
            AuthorizationBasis::Owner
        } else {
            match self.delegation.active_grant(&order, subject_id).await? {
                Some(grant) => AuthorizationBasis::TrustedContact {
                    account_holder_id: order.customer_id,
                    granted_at: grant.created_at,
                },
                None => return Ok(AuthorizationResult::denied(DenialReason::NotAuthorized)),
            }
        };

        let Some(presented_identity) = self.identity.presented_identity(subject_id).await? else {
            log_warn!(
                "RESOLVER: no identity profile for subject {} on order {}",
                subject_id,
                order_id
            );
            return Ok(AuthorizationResult::denied(DenialReason::NotAuthorized));
        };

        Ok(AuthorizationResult::Authorized {
            order,
            presented_identity,
            basis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::OrderLedger;
    use crate::models::NewOrder;
    use crate::services::test_support::{TestWorld, ALICE, CAROL};
    use futures::executor::block_on;

    fn denial(result: AuthorizationResult) -> Option<DenialReason> {
        result.denial_reason()
    }

    #[test]
    fn owner_is_authorized_once_delivered() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let order_id = world.delivered_order(alice);

        match block_on(world.services.resolver.resolve(order_id, alice)).unwrap() {
            AuthorizationResult::Authorized {
                order,
                presented_identity,
                basis,
            } => {
                assert_eq!(order.order_id, order_id);
                assert_eq!(presented_identity.user_id, alice);
                assert_eq!(basis, AuthorizationBasis::Owner);
            }
            other => panic!("expected authorization, got {:?}", other),
        }
    }

    #[test]
    fn first_matching_denial_is_reported() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let carol = world.customer(CAROL);
        let resolver = &world.services.resolver;

        assert_eq!(
            denial(block_on(resolver.resolve(404, alice)).unwrap()),
            Some(DenialReason::OrderNotFound)
        );

        let pending = block_on(world.ledger.place_order(
            NewOrder {
                vendor_reference: "VND-P".to_string(),
                customer_id: alice,
                location_id: 1,
            },
            world.now(),
        ))
        .unwrap();
        // A stranger asking about an undelivered order hears about delivery first.
        assert_eq!(
            denial(block_on(resolver.resolve(pending.order_id, carol)).unwrap()),
            Some(DenialReason::NotYetDelivered)
        );

        let delivered = world.delivered_order(alice);
        assert_eq!(
            denial(block_on(resolver.resolve(delivered, carol)).unwrap()),
            Some(DenialReason::NotAuthorized)
        );

        block_on(world.ledger.conditional_mark_picked_up(delivered, world.now(), alice)).unwrap();
        assert_eq!(
            denial(block_on(resolver.resolve(delivered, carol)).unwrap()),
            Some(DenialReason::AlreadyPickedUp)
        );
        assert_eq!(
            denial(block_on(resolver.resolve(delivered, alice)).unwrap()),
            Some(DenialReason::AlreadyPickedUp)
        );
    }

    #[test]
    fn trusted_contact_needs_active_grant_and_accepted_relationship() {
        let world = TestWorld::new();
        let (alice, bob) = world.accepted_pair();
        let order_id = world.delivered_order(alice);
        let resolver = &world.services.resolver;
        let delegation = &world.services.delegation;

        assert_eq!(
            denial(block_on(resolver.resolve(order_id, bob)).unwrap()),
            Some(DenialReason::NotAuthorized)
        );

        block_on(delegation.set_sharing(alice, order_id, bob, true)).unwrap();
        match block_on(resolver.resolve(order_id, bob)).unwrap() {
            AuthorizationResult::Authorized {
                basis: AuthorizationBasis::TrustedContact { account_holder_id, .. },
                presented_identity,
                ..
            } => {
                assert_eq!(account_holder_id, alice);
                assert_eq!(presented_identity.user_id, bob);
            }
            other => panic!("expected delegated authorization, got {:?}", other),
        }

        block_on(delegation.set_sharing(alice, order_id, bob, false)).unwrap();
        assert_eq!(
            denial(block_on(resolver.resolve(order_id, bob)).unwrap()),
            Some(DenialReason::NotAuthorized)
        );
    }

    #[test]
    fn grant_from_another_holder_does_not_authorize() {
        let world = TestWorld::new();
        let (_alice, bob) = world.accepted_pair();
        // Carol's order, with no relationship between Carol and Bob.
        let carol = world.customer(CAROL);
        let order_id = world.delivered_order(carol);
        assert_eq!(
            denial(block_on(world.services.resolver.resolve(order_id, bob)).unwrap()),
            Some(DenialReason::NotAuthorized)
        );
    }

    #[test]
    fn missing_identity_profile_denies_instead_of_authorizing() {
        let world = TestWorld::new();
        let alice = world.customer(ALICE);
        let order_id = world.delivered_order(alice);
        // Resolve as a subject who owns the order in the ledger but has no profile.
        let ghost_order = block_on(world.ledger.place_order(
            NewOrder {
                vendor_reference: "VND-G".to_string(),
                customer_id: 999,
                location_id: 1,
            },
            world.now(),
        ))
        .unwrap();
        block_on(world.ledger.mark_delivered(ghost_order.order_id, world.now())).unwrap();

        assert!(block_on(world.services.resolver.resolve(order_id, alice)).unwrap().is_authorized());
        assert_eq!(
            denial(block_on(world.services.resolver.resolve(ghost_order.order_id, 999)).unwrap()),
            Some(DenialReason::NotAuthorized)
        );
    }
}
