// src/backend/utils/rng.rs

use crate::error::LockerError;
use ic_cdk::api::management_canister::main::raw_rand;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::cell::RefCell;

thread_local! {
    // Seeded from raw_rand; used for key material and the getrandom hook.
    static INTERNAL_RNG: RefCell<Option<ChaCha20Rng>> = const { RefCell::new(None) };
}

/// Seeds the thread-local ChaCha20 generator from the IC's `raw_rand`.
/// Called from a timer after init and post_upgrade.
pub async fn initialize_internal_rng() -> Result<(), LockerError> {
    let (bytes,) = raw_rand().await.map_err(|(code, msg)| {
        LockerError::ServiceUnavailable(format!("raw_rand failed: code={:?}, msg={}", code, msg))
    })?;
    let seed: [u8; 32] = bytes
        .get(..32)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| LockerError::InternalError("raw_rand returned insufficient bytes for seed".to_string()))?;
    seed_internal_rng(seed);
    log_info!("RNG: internal generator seeded");
    Ok(())
}

pub fn seed_internal_rng(seed: [u8; 32]) {
    INTERNAL_RNG.with(|rng| *rng.borrow_mut() = Some(ChaCha20Rng::from_seed(seed)));
}

pub fn is_seeded() -> bool {
    INTERNAL_RNG.with(|rng| rng.borrow().is_some())
}

/// Fills `buf` from the internal generator.
pub fn fill_random(buf: &mut [u8]) -> Result<(), LockerError> {
    INTERNAL_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => {
            rng.fill_bytes(buf);
            Ok(())
        }
        None => Err(LockerError::ServiceUnavailable(
            "Random generator not seeded yet".to_string(),
        )),
    })
}

pub fn random_bytes(len: usize) -> Result<Vec<u8>, LockerError> {
    let mut buf = vec![0u8; len];
    fill_random(&mut buf)?;
    Ok(buf)
}

#[cfg(target_arch = "wasm32")]
pub fn custom_getrandom(buf: &mut [u8]) -> Result<(), getrandom::Error> {
    fill_random(buf).map_err(|_| getrandom::Error::UNSUPPORTED)
}

#[cfg(target_arch = "wasm32")]
getrandom::register_custom_getrandom!(custom_getrandom);
