//! Token hashing.
//!
//! [`token_hash`] implements the `at_hash` / `c_hash` algorithm from OpenID
//! Connect Core 3.2.2.9 and 3.3.2.11 for RS256: SHA-256 over the ASCII token,
//! keep the left-most 128 bits, base64url without padding.
//!
//! [`hash_secret`] is the at-rest representation of bearer secrets (refresh
//! tokens, registration access tokens, client secrets). Lookups go through the
//! hash so the raw value never reaches storage.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use super::constant_time_eq;

/// Computes the OIDC `at_hash` / `c_hash` value for a token.
///
/// Always 22 characters long.
#[must_use]
pub fn token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Hashes a bearer secret for storage (SHA-256, lowercase hex).
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Checks a presented secret against a stored [`hash_secret`] value.
#[must_use]
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_secret(secret).as_bytes(), stored_hash.as_bytes())
}
