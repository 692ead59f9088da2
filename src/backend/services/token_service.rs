// src/backend/services/token_service.rs
//! Pickup tokens: short-lived, signed and self-contained.
//!
//! Wire form is `b64url(cbor(payload)) "." b64url(hmac_sha256(key, cbor(payload)))`.
//! Nothing is stored per token; validation needs only the key and the clock.
//! The ledger-side single-use commit is what makes a replayed token harmless.

use crate::adapter::{Clock, OrderLedger};
use crate::error::LockerError;
use crate::models::{
    secs_to_nanos, IssuedToken, OrderId, PickupTokenClaims, Timestamp, TokenRejection, UserId,
};
use crate::storage::config::{DEFAULT_TOKEN_REFRESH_SECS, DEFAULT_TOKEN_TTL_SECS};
use crate::utils::crypto::{decode_b64, encode_b64, fingerprint, hmac_sha256, verify_hmac_sha256};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub const TOKEN_VERSION: u8 = 1;
pub const MAX_TOKEN_LEN: usize = 512;
pub const SIGNING_KEY_LEN: usize = 32;

pub const MIN_TTL_SECS: u64 = 30;
pub const MAX_TTL_SECS: u64 = 3600;
pub const MIN_REFRESH_SECS: u64 = 5;
pub const MAX_REFRESH_SECS: u64 = 600;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct TokenPayload {
    v: u8,
    o: OrderId,
    s: UserId,
    iat: Timestamp,
    exp: Timestamp,
}

/// Lifetime of issued tokens and how often clients should fetch a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenPolicy {
    pub ttl_secs: u64,
    pub refresh_secs: u64,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            refresh_secs: DEFAULT_TOKEN_REFRESH_SECS,
        }
    }
}

impl TokenPolicy {
    pub fn checked(ttl_secs: u64, refresh_secs: u64) -> Result<Self, LockerError> {
        if !(MIN_TTL_SECS..=MAX_TTL_SECS).contains(&ttl_secs) {
            return Err(LockerError::InvalidInput(format!(
                "Token TTL must be between {} and {} seconds",
                MIN_TTL_SECS, MAX_TTL_SECS
            )));
        }
        if !(MIN_REFRESH_SECS..=MAX_REFRESH_SECS).contains(&refresh_secs) || refresh_secs >= ttl_secs {
            return Err(LockerError::InvalidInput(
                "Token refresh interval must be shorter than the TTL".to_string(),
            ));
        }
        Ok(Self { ttl_secs, refresh_secs })
    }
}

pub struct TokenService {
    ledger: Rc<dyn OrderLedger>,
    clock: Rc<dyn Clock>,
    signing_key: RefCell<Option<Vec<u8>>>,
    policy: Cell<TokenPolicy>,
}

impl TokenService {
    pub fn new(ledger: Rc<dyn OrderLedger>, clock: Rc<dyn Clock>, policy: TokenPolicy) -> Self {
        Self {
            ledger,
            clock,
            signing_key: RefCell::new(None),
            policy: Cell::new(policy),
        }
    }

    pub fn install_signing_key(&self, key: Vec<u8>) -> Result<(), LockerError> {
        if key.len() != SIGNING_KEY_LEN {
            return Err(LockerError::InvalidInput(format!(
                "Signing key must be {} bytes",
                SIGNING_KEY_LEN
            )));
        }
        *self.signing_key.borrow_mut() = Some(key);
        Ok(())
    }

    pub fn has_signing_key(&self) -> bool {
        self.signing_key.borrow().is_some()
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy.get()
    }

    pub fn set_policy(&self, policy: TokenPolicy) {
        self.policy.set(policy);
    }

    /// Mints a token for the owning customer of `order_id`.
    pub async fn issue(&self, order_id: OrderId, subject_id: UserId) -> Result<IssuedToken, LockerError> {
        let key = self
            .signing_key
            .borrow()
            .clone()
            .ok_or_else(|| LockerError::ServiceUnavailable("Token signing key not ready".to_string()))?;

        let order = self
            .ledger
            .find_order(order_id)
            .await?
            .ok_or(LockerError::OrderNotFound(order_id))?;
        if order.customer_id != subject_id {
            return Err(LockerError::NotAuthorized(
                "Only the order's customer can request a pickup token".to_string(),
            ));
        }

        let policy = self.policy.get();
        let issued_at = self.clock.now();
        let expires_at = issued_at.saturating_add(secs_to_nanos(policy.ttl_secs));
        let payload = TokenPayload {
            v: TOKEN_VERSION,
            o: order_id,
            s: subject_id,
            iat: issued_at,
            exp: expires_at,
        };
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&payload, &mut encoded)
            .map_err(|e| LockerError::InternalError(format!("Failed to encode token payload: {}", e)))?;
        let token = seal(&key, &encoded)?;

        log_info!(
            "TOKEN: issued {} for order {} subject {} expiring {}",
            fingerprint(&token),
            order_id,
            subject_id,
            expires_at
        );
        Ok(IssuedToken {
            token,
            order_id,
            issued_at,
            expires_at,
            refresh_after: issued_at.saturating_add(secs_to_nanos(policy.refresh_secs)),
        })
    }

    pub fn validate(&self, token: &str) -> Result<PickupTokenClaims, TokenRejection> {
        self.validate_at(token, self.clock.now())
    }

    /// Structural, integrity and expiry checks, in that order. No ledger access.
    pub fn validate_at(&self, token: &str, now: Timestamp) -> Result<PickupTokenClaims, TokenRejection> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(TokenRejection::Malformed);
        }
        let mut parts = token.split('.');
        let (Some(body), Some(sig), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TokenRejection::Malformed);
        };
        let body = decode_b64(body).ok_or(TokenRejection::Malformed)?;
        let sig = decode_b64(sig).ok_or(TokenRejection::Malformed)?;
        if body.is_empty() || sig.is_empty() {
            return Err(TokenRejection::Malformed);
        }

        let key = self.signing_key.borrow();
        let Some(key) = key.as_deref() else {
            return Err(TokenRejection::Tampered);
        };
        if !verify_hmac_sha256(key, &body, &sig) {
            return Err(TokenRejection::Tampered);
        }

        let payload: TokenPayload =
            ciborium::de::from_reader(body.as_slice()).map_err(|_| TokenRejection::Malformed)?;
        if payload.v != TOKEN_VERSION || payload.iat > payload.exp {
            return Err(TokenRejection::Malformed);
        }
        if now >= payload.exp {
            return Err(TokenRejection::Expired);
        }

        Ok(PickupTokenClaims {
            order_id: payload.o,
            subject_id: payload.s,
            issued_at: payload.iat,
            expires_at: payload.exp,
        })
    }
}

fn seal(key: &[u8], body: &[u8]) -> Result<String, LockerError> {
    Ok(format!("{}.{}", encode_b64(body), encode_b64(&hmac_sha256(key, body)?)))
}
