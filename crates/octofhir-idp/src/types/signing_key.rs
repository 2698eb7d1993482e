//! Stored signing keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An RSA signing key and its lifecycle metadata.
///
/// At most one stored key is `active`. Retired keys keep an `expires_at` and
/// stay usable for verification until then.
#[derive(Clone, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key id, published as `kid`.
    pub kid: String,

    /// JWS algorithm.
    pub algorithm: String,

    /// PKCS#8 PEM private key.
    pub private_key_pem: String,

    /// SPKI PEM public key.
    pub public_key_pem: String,

    /// Whether new tokens are signed with this key.
    pub active: bool,

    /// When the key was generated.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// End of the verification grace period. `None` while active.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl SigningKey {
    /// Returns `true` if the key's grace period is over.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// [`Self::is_expired_at`] against the current time.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("private_key_pem", &"[REDACTED]")
            .field("active", &self.active)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
