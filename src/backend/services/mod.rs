// src/backend/services/mod.rs
pub mod access_service;
pub mod delegation_service;
pub mod effects;
pub mod fulfillment_service;
pub mod resolver;
pub mod scheduler;
pub mod token_service;

#[cfg(test)]
pub(crate) mod test_support;

use crate::adapter::{Clock, DelegationStore, EffectJournal, IdentityProvider, Metering, Notifier, OrderLedger};
use crate::storage::ReadyForPickupCache;
use delegation_service::DelegationService;
use effects::PickupEffects;
use fulfillment_service::FulfillmentService;
use resolver::AuthorizationResolver;
use std::rc::Rc;
use token_service::{TokenPolicy, TokenService};

/// Everything the services talk to outside the core.
pub struct Collaborators {
    pub ledger: Rc<dyn OrderLedger>,
    pub delegation_store: Rc<dyn DelegationStore>,
    pub identity: Rc<dyn IdentityProvider>,
    pub notifier: Rc<dyn Notifier>,
    pub metering: Rc<dyn Metering>,
    pub ready_cache: Rc<ReadyForPickupCache>,
    pub journal: Rc<dyn EffectJournal>,
    pub clock: Rc<dyn Clock>,
}

/// The wired service graph. Cloning shares the same instances.
#[derive(Clone)]
pub struct LockerServices {
    pub tokens: Rc<TokenService>,
    pub resolver: Rc<AuthorizationResolver>,
    pub delegation: Rc<DelegationService>,
    pub fulfillment: Rc<FulfillmentService>,
    pub effects: Rc<PickupEffects>,
}

impl LockerServices {
    pub fn assemble(c: Collaborators, policy: TokenPolicy) -> Self {
        let tokens = Rc::new(TokenService::new(c.ledger.clone(), c.clock.clone(), policy));
        let delegation = Rc::new(DelegationService::new(
            c.delegation_store,
            c.ledger.clone(),
            c.identity.clone(),
            c.clock.clone(),
        ));
        let resolver = Rc::new(AuthorizationResolver::new(
            c.ledger.clone(),
            delegation.clone(),
            c.identity,
        ));
        let effects = Rc::new(PickupEffects::new(
            c.ledger.clone(),
            c.notifier.clone(),
            c.metering,
            c.ready_cache.clone(),
            c.journal,
            c.clock.clone(),
        ));
        let fulfillment = Rc::new(FulfillmentService::new(
            c.ledger,
            resolver.clone(),
            tokens.clone(),
            effects.clone(),
            c.notifier,
            c.ready_cache,
            c.clock,
        ));
        Self {
            tokens,
            resolver,
            delegation,
            fulfillment,
            effects,
        }
    }
}
