//! HMAC-SHA256 Request Signing
//!
//! Signed Spot endpoints require the query string to carry a `signature`
//! parameter: the lowercase hex HMAC-SHA256 of the entire query string
//! keyed by the API secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The signing key was rejected by the MAC implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid signing key")]
pub struct SigningError;

/// Sign a query string with the API secret.
///
/// # Errors
///
/// Returns [`SigningError`] if the secret cannot be used as an HMAC key.
pub fn sign(secret: &str, query: &str) -> Result<String, SigningError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SigningError)?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
