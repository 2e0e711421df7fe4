//! HMAC request signatures for the partner API.
//!
//! The partner verifies the signature over the exact query string bytes, so
//! callers must pass the literal string they send, not a re-encoded map.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Base64 (standard alphabet, padded) HMAC-SHA256 of `payload` keyed by `secret`.
pub fn sign_payload(secret: &str, payload: &str) -> Result<String, DomainError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| DomainError::invariant(format!("invalid signing key: {err}")))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
