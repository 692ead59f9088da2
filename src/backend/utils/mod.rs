// src/backend/utils/mod.rs

#[macro_use]
pub mod log;

pub mod crypto;
pub mod guards;
pub mod rate_limit;
pub mod rng;
pub mod time;
