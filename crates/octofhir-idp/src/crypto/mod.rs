//! Cryptographic primitives used across the provider.
//!
//! - [`pkce`] - RFC 7636 challenge verification (`plain` and `S256`)
//! - [`hash`] - OIDC `at_hash`/`c_hash` and storage hashes for bearer secrets
//! - [`random`] - URL-safe random tokens, codes, and identifiers
//! - [`password`] - Argon2 password hashing and verification

pub mod hash;
pub mod password;
pub mod pkce;
pub mod random;

use subtle::ConstantTimeEq;

pub use hash::{hash_secret, token_hash};
pub use password::{hash_password, verify_password};
pub use pkce::{PkceError, PkceMethod, s256_challenge, verify_pkce};
pub use random::{generate_client_id, generate_token};

/// Compares two byte strings in constant time.
///
/// Length differences return `false` immediately; the content comparison
/// never short-circuits.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
