// src/backend/utils/rate_limit.rs
use crate::error::LockerError;
use crate::models::{Timestamp, NANOS_PER_SEC};
use candid::Principal;
use std::cell::RefCell;
use std::collections::HashMap;

// --- Configuration ---
const ISSUE_CAPACITY: u32 = 10; // A pickup screen refreshes about once a minute
const ISSUE_REFILL_RATE_PER_SEC: f64 = 0.5;
const SCAN_CAPACITY: u32 = 30; // Attendants scan in bursts at the counter
const SCAN_REFILL_RATE_PER_SEC: f64 = 2.0;

struct TokenBucket {
    tokens: f64,
    last_refill_time_ns: Timestamp,
}

impl TokenBucket {
    fn new(capacity: u32, now_ns: Timestamp) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill_time_ns: now_ns,
        }
    }

    fn refill(&mut self, capacity: u32, refill_per_sec: f64, now_ns: Timestamp) {
        let elapsed_secs = now_ns.saturating_sub(self.last_refill_time_ns) as f64 / NANOS_PER_SEC as f64;
        self.tokens = (self.tokens + elapsed_secs * refill_per_sec).min(capacity as f64);
        self.last_refill_time_ns = now_ns.max(self.last_refill_time_ns);
    }
}

/// Per-principal token bucket limiter. Heap only, cleared on upgrade.
pub struct RateLimiter {
    capacity: u32,
    refill_per_sec: f64,
    buckets: HashMap<Principal, TokenBucket>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            buckets: HashMap::new(),
        }
    }

    /// Takes one token for `principal`; false when the bucket is empty.
    pub fn try_acquire(&mut self, principal: Principal, now_ns: Timestamp) -> bool {
        let capacity = self.capacity;
        let bucket = self
            .buckets
            .entry(principal)
            .or_insert_with(|| TokenBucket::new(capacity, now_ns));
        bucket.refill(capacity, self.refill_per_sec, now_ns);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

thread_local! {
    static ISSUE_LIMITER: RefCell<RateLimiter> =
        RefCell::new(RateLimiter::new(ISSUE_CAPACITY, ISSUE_REFILL_RATE_PER_SEC));
    static SCAN_LIMITER: RefCell<RateLimiter> =
        RefCell::new(RateLimiter::new(SCAN_CAPACITY, SCAN_REFILL_RATE_PER_SEC));
}

fn limit(
    limiter: &'static std::thread::LocalKey<RefCell<RateLimiter>>,
    what: &str,
    caller: Principal,
    now_ns: Timestamp,
) -> Result<(), LockerError> {
    if limiter.with(|l| l.borrow_mut().try_acquire(caller, now_ns)) {
        Ok(())
    } else {
        Err(LockerError::RateLimitExceeded(format!(
            "Too many {} requests from {}. Please try again later.",
            what, caller
        )))
    }
}

pub fn check_issue_rate(caller: Principal, now_ns: Timestamp) -> Result<(), LockerError> {
    limit(&ISSUE_LIMITER, "token", caller, now_ns)
}

pub fn check_scan_rate(caller: Principal, now_ns: Timestamp) -> Result<(), LockerError> {
    limit(&SCAN_LIMITER, "scan", caller, now_ns)
}
