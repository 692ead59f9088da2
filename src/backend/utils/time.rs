// src/backend/utils/time.rs
use crate::adapter::Clock;
use crate::models::Timestamp;
use std::cell::Cell;

/// Returns the current Internet Computer time as nanoseconds since epoch.
pub fn get_current_time_ns() -> Timestamp {
    ic_cdk::api::time()
}

/// The replica clock. Constant within one message execution.
#[derive(Default, Clone, Copy)]
pub struct IcClock;

impl Clock for IcClock {
    fn now(&self) -> Timestamp {
        get_current_time_ns()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, at: Timestamp) {
        self.now.set(at);
    }

    pub fn advance(&self, by: Timestamp) {
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}
