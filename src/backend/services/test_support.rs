// src/backend/services/test_support.rs
//! Shared fixtures for service tests: one in-memory canister per test.

use crate::adapter::{DelegationStore, OrderLedger};
use crate::error::LockerError;
use crate::models::{
    AccessScope, InsertOutcome, NewOrder, Order, OrderId, PendingInvitation, ShareGrant, Timestamp,
    TrustedContactRelationship, UserId, NANOS_PER_SEC,
};
use crate::services::token_service::TokenPolicy;
use crate::services::{Collaborators, LockerServices};
use crate::storage::memory::{detached_manager, Manager};
use crate::storage::{
    NewProfile, ReadyForPickupCache, StableDelegationStore, StableEffectJournal, StableNotificationInbox,
    StableOrderLedger, StableUsageLog, StableUserDirectory,
};
use crate::utils::time::ManualClock;
use async_trait::async_trait;
use candid::Principal;
use futures::executor::block_on;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

pub const ALICE: u8 = 1;
pub const BOB: u8 = 2;
pub const CAROL: u8 = 3;

pub const T0: Timestamp = 1_700_000_000 * NANOS_PER_SEC;
pub const COUNTER_LOCATION: u64 = 1;

/// Scope of an attendant working the counter at location 1.
pub fn counter_scope() -> AccessScope {
    AccessScope::LocationSet([COUNTER_LOCATION].into_iter().collect())
}

fn seed_name(seed: u8) -> &'static str {
    match seed {
        ALICE => "alice",
        BOB => "bob",
        CAROL => "carol",
        _ => "someone",
    }
}

/// Returns `Pending` once, then completes.
pub struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

pub fn yield_now() -> YieldNow {
    YieldNow(false)
}

/// Ledger that suspends after every read, so concurrent callers all observe
/// the same state before any of them writes.
pub struct YieldingLedger(pub Rc<StableOrderLedger>);

#[async_trait(?Send)]
impl OrderLedger for YieldingLedger {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, LockerError> {
        let order = self.0.find_order(order_id).await;
        yield_now().await;
        order
    }

    async fn place_order(&self, order: NewOrder, at: Timestamp) -> Result<Order, LockerError> {
        self.0.place_order(order, at).await
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, LockerError> {
        self.0.orders_for_customer(customer_id).await
    }

    async fn mark_shipped(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
        self.0.mark_shipped(order_id, at).await
    }

    async fn mark_delivered(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
        self.0.mark_delivered(order_id, at).await
    }

    async fn mark_processed(&self, order_id: OrderId, at: Timestamp) -> Result<u64, LockerError> {
        self.0.mark_processed(order_id, at).await
    }

    async fn conditional_mark_picked_up(
        &self,
        order_id: OrderId,
        at: Timestamp,
        collected_by: UserId,
    ) -> Result<u64, LockerError> {
        self.0.conditional_mark_picked_up(order_id, at, collected_by).await
    }
}

/// Delegation store that suspends after listing invitations.
pub struct YieldingDelegationStore(pub Rc<StableDelegationStore>);

#[async_trait(?Send)]
impl DelegationStore for YieldingDelegationStore {
    async fn relationship(
        &self,
        account_holder_id: UserId,
        trusted_contact_id: UserId,
    ) -> Result<Option<TrustedContactRelationship>, LockerError> {
        self.0.relationship(account_holder_id, trusted_contact_id).await
    }

    async fn insert_relationship_if_absent(
        &self,
        relationship: TrustedContactRelationship,
    ) -> Result<InsertOutcome<TrustedContactRelationship>, LockerError> {
        self.0.insert_relationship_if_absent(relationship).await
    }

    async fn save_relationship(&self, relationship: &TrustedContactRelationship) -> Result<(), LockerError> {
        self.0.save_relationship(relationship).await
    }

    async fn relationships_for_holder(
        &self,
        account_holder_id: UserId,
    ) -> Result<Vec<TrustedContactRelationship>, LockerError> {
        self.0.relationships_for_holder(account_holder_id).await
    }

    async fn relationships_for_contact(
        &self,
        trusted_contact_id: UserId,
    ) -> Result<Vec<TrustedContactRelationship>, LockerError> {
        self.0.relationships_for_contact(trusted_contact_id).await
    }

    async fn share_grant(&self, order_id: OrderId, shared_with_id: UserId) -> Result<Option<ShareGrant>, LockerError> {
        self.0.share_grant(order_id, shared_with_id).await
    }

    async fn save_share_grant(&self, grant: &ShareGrant) -> Result<(), LockerError> {
        self.0.save_share_grant(grant).await
    }

    async fn grants_for_order(&self, order_id: OrderId) -> Result<Vec<ShareGrant>, LockerError> {
        self.0.grants_for_order(order_id).await
    }

    async fn grants_for_contact(&self, shared_with_id: UserId) -> Result<Vec<ShareGrant>, LockerError> {
        self.0.grants_for_contact(shared_with_id).await
    }

    async fn queue_invitation(
        &self,
        email: &str,
        account_holder_id: UserId,
        at: Timestamp,
    ) -> Result<PendingInvitation, LockerError> {
        self.0.queue_invitation(email, account_holder_id, at).await
    }

    async fn unprocessed_invitations(&self, email: &str) -> Result<Vec<PendingInvitation>, LockerError> {
        let invitations = self.0.unprocessed_invitations(email).await;
        yield_now().await;
        invitations
    }

    async fn mark_invitation_processed(&self, invitation_id: u64, at: Timestamp) -> Result<bool, LockerError> {
        self.0.mark_invitation_processed(invitation_id, at).await
    }

    async fn purge_processed_invitations(&self, processed_before: Timestamp) -> Result<u64, LockerError> {
        self.0.purge_processed_invitations(processed_before).await
    }
}

/// A fully wired service graph over detached stable memory.
pub struct TestWorld {
    pub clock: Rc<ManualClock>,
    pub ledger: Rc<StableOrderLedger>,
    pub delegation_store: Rc<StableDelegationStore>,
    pub users: Rc<StableUserDirectory>,
    pub inbox: Rc<StableNotificationInbox>,
    pub usage: Rc<StableUsageLog>,
    pub cache: Rc<ReadyForPickupCache>,
    pub journal: Rc<StableEffectJournal>,
    pub services: LockerServices,
    next_reference: Cell<u32>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Same world, but the services see stores that yield after reads.
    pub fn with_yielding_reads() -> Self {
        Self::build(true)
    }

    fn build(yielding: bool) -> Self {
        let manager: Manager = detached_manager();
        let clock = Rc::new(ManualClock::new(T0));
        let ledger = Rc::new(StableOrderLedger::init(&manager).unwrap());
        let delegation_store = Rc::new(StableDelegationStore::init(&manager).unwrap());
        let users = Rc::new(StableUserDirectory::init(&manager).unwrap());
        let inbox = Rc::new(StableNotificationInbox::init(&manager, clock.clone()));
        let usage = Rc::new(StableUsageLog::init(&manager, clock.clone()).unwrap());
        let cache = Rc::new(ReadyForPickupCache::new());
        let journal = Rc::new(StableEffectJournal::init(&manager));

        let (service_ledger, service_store): (Rc<dyn OrderLedger>, Rc<dyn DelegationStore>) = if yielding {
            (
                Rc::new(YieldingLedger(ledger.clone())),
                Rc::new(YieldingDelegationStore(delegation_store.clone())),
            )
        } else {
            (ledger.clone(), delegation_store.clone())
        };

        let services = LockerServices::assemble(
            Collaborators {
                ledger: service_ledger,
                delegation_store: service_store,
                identity: users.clone(),
                notifier: inbox.clone(),
                metering: usage.clone(),
                ready_cache: cache.clone(),
                journal: journal.clone(),
                clock: clock.clone(),
            },
            TokenPolicy::default(),
        );
        services.tokens.install_signing_key(vec![42; 32]).unwrap();

        Self {
            clock,
            ledger,
            delegation_store,
            users,
            inbox,
            usage,
            cache,
            journal,
            services,
            next_reference: Cell::new(0),
        }
    }

    pub fn now(&self) -> Timestamp {
        use crate::adapter::Clock;
        self.clock.now()
    }

    /// Registers (or looks up) the customer for a fixed principal seed.
    pub fn customer(&self, seed: u8) -> UserId {
        let principal = Principal::from_slice(&[seed; 10]);
        if let Some(user_id) = self.users.user_for_principal(&principal) {
            return user_id;
        }
        let name = seed_name(seed);
        self.users
            .register(
                NewProfile {
                    principal,
                    email: format!("{name}@example.com"),
                    legal_name: format!("{name} tester"),
                    photo_url: Some(format!("https://photos.example.com/{name}.jpg")),
                },
                self.now(),
            )
            .unwrap()
            .user_id
    }

    /// Alice and Bob with an accepted relationship, Alice as holder.
    pub fn accepted_pair(&self) -> (UserId, UserId) {
        let alice = self.customer(ALICE);
        let bob = self.customer(BOB);
        block_on(self.services.delegation.invite(alice, "bob@example.com")).unwrap();
        block_on(self.services.delegation.accept(alice, bob)).unwrap();
        (alice, bob)
    }

    /// An order sitting in the locker at the counter location.
    pub fn delivered_order(&self, customer_id: UserId) -> OrderId {
        let n = self.next_reference.get() + 1;
        self.next_reference.set(n);
        let order = block_on(self.ledger.place_order(
            NewOrder {
                vendor_reference: format!("VND-{n:04}"),
                customer_id,
                location_id: COUNTER_LOCATION,
            },
            self.now(),
        ))
        .unwrap();
        block_on(self.ledger.mark_delivered(order.order_id, self.now())).unwrap();
        order.order_id
    }

    pub fn order(&self, order_id: OrderId) -> Order {
        block_on(self.ledger.find_order(order_id)).unwrap().unwrap()
    }
}
