//! Initial access tokens gating dynamic registration.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::crypto::hash_secret;

/// A single-use token authorizing one `POST /register` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialAccessToken {
    /// Digest of the token value.
    pub token_hash: String,

    /// When the token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Optional expiry.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,

    /// Whether the token has been spent.
    #[serde(default)]
    pub used: bool,

    /// Client registered with this token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<String>,

    /// When the token was spent.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub used_at: Option<OffsetDateTime>,
}

impl InitialAccessToken {
    /// Creates an unused token record from the raw token value.
    #[must_use]
    pub fn new(token: &str, expires_at: Option<OffsetDateTime>) -> Self {
        Self {
            token_hash: hash_secret(token),
            created_at: OffsetDateTime::now_utc(),
            expires_at,
            used: false,
            used_by: None,
            used_at: None,
        }
    }

    /// Returns `true` if the token is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| OffsetDateTime::now_utc() >= exp)
    }
}
