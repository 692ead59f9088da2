// src/backend/utils/crypto.rs
// Hashing, MAC and encoding helpers shared by the token service and logging.

use crate::error::LockerError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(key: &[u8]) -> Result<HmacSha256, LockerError> {
    HmacSha256::new_from_slice(key)
        .map_err(|e| LockerError::InternalError(format!("Invalid MAC key: {}", e)))
}

/// Computes HMAC-SHA256 of `payload` under `key`.
pub fn hmac_sha256(key: &[u8], payload: &[u8]) -> Result<Vec<u8>, LockerError> {
    let mut mac = keyed_mac(key)?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Checks a MAC in constant time. An unusable key verifies nothing.
pub fn verify_hmac_sha256(key: &[u8], payload: &[u8], signature: &[u8]) -> bool {
    match keyed_mac(key) {
        Ok(mut mac) => {
            mac.update(payload);
            mac.verify_slice(signature).is_ok()
        }
        Err(e) => {
            log_error!("CRYPTO: {}", e);
            false
        }
    }
}

pub fn encode_b64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn decode_b64(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(data).ok()
}

/// Calculates the SHA256 hash of byte data and returns it as a hex string.
pub fn calculate_sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Short stable identifier for a bearer value, safe to write to logs.
pub fn fingerprint(secret: &str) -> String {
    let mut digest = calculate_sha256_hex(secret.as_bytes());
    digest.truncate(12);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_verifies_only_with_same_key_and_payload() {
        let sig = hmac_sha256(b"key-one", b"payload").unwrap();
        assert_eq!(sig.len(), 32);
        assert!(verify_hmac_sha256(b"key-one", b"payload", &sig));
        assert!(!verify_hmac_sha256(b"key-two", b"payload", &sig));
        assert!(!verify_hmac_sha256(b"key-one", b"payload!", &sig));
        assert!(!verify_hmac_sha256(b"key-one", b"payload", &sig[..31]));
    }

    #[test]
    fn mac_accepts_empty_and_oversized_keys() {
        let empty = hmac_sha256(b"", b"payload").unwrap();
        assert!(verify_hmac_sha256(b"", b"payload", &empty));
        let long_key = [9u8; 200];
        let long = hmac_sha256(&long_key, b"payload").unwrap();
        assert!(verify_hmac_sha256(&long_key, b"payload", &long));
        assert_ne!(empty, long);
    }

    #[test]
    fn base64_is_url_safe_without_padding() {
        let encoded = encode_b64(&[0xfb, 0xff, 0x01]);
        assert!(!encoded.contains('+') && !encoded.contains('/') && !encoded.contains('='));
        assert_eq!(decode_b64(&encoded).unwrap(), vec![0xfb, 0xff, 0x01]);
        assert!(decode_b64("not base64!").is_none());
    }

    #[test]
    fn fingerprint_is_short_hex() {
        let fp = fingerprint("some.token");
        assert_eq!(fp.len(), 12);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fingerprint("some.token"));
    }
}
