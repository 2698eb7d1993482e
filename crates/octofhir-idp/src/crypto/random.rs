//! Random value generation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;

/// Generates a 256-bit random token, base64url encoded (43 characters).
///
/// Used for authorization codes, refresh tokens, registration access tokens,
/// client secrets, and `state`/`nonce` values.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a client identifier for dynamic registration.
#[must_use]
pub fn generate_client_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
