//! Authorization code records.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::crypto::PkceMethod;
use crate::crypto::random::generate_token;

/// Default authorization code lifetime in seconds (10 minutes).
pub const DEFAULT_CODE_LIFETIME_SECS: i64 = 600;

/// A single-use authorization code.
///
/// Binds the authenticated user, client, redirect URI, scope, nonce, and PKCE
/// challenge. Storage backends delete the record when it is consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Record id, copied into the issued token record.
    pub id: Uuid,

    /// The code value handed to the client.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Authenticated end user.
    pub user_id: String,

    /// Redirect URI used at the authorization endpoint.
    pub redirect_uri: String,

    /// Granted scope (space-delimited).
    pub scope: String,

    /// Nonce from the authorization request, echoed in the ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// PKCE code challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<PkceMethod>,

    /// When the end user authenticated (unix seconds).
    pub auth_time: i64,

    /// Authentication context class reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authentication method references.
    #[serde(default)]
    pub amr: Vec<String>,

    /// Issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Expiration time.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCode {
    /// Generates a fresh code value.
    #[must_use]
    pub fn generate_code() -> String {
        generate_token()
    }

    /// Returns `true` once the code has outlived its lifetime.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Expiry check against an explicit instant.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Lifetime from issue to expiry.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.expires_at - self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(created_at: OffsetDateTime) -> AuthorizationCode {
        AuthorizationCode {
            id: Uuid::new_v4(),
            code: AuthorizationCode::generate_code(),
            client_id: "app".to_string(),
            user_id: "alice".to_string(),
            redirect_uri: "https://app.example.com/cb".to_string(),
            scope: "openid".to_string(),
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            auth_time: created_at.unix_timestamp(),
            acr: None,
            amr: vec!["pwd".to_string()],
            created_at,
            expires_at: created_at + Duration::seconds(DEFAULT_CODE_LIFETIME_SECS),
        }
    }

    #[test]
    fn test_code_expires_after_ten_minutes() {
        let issued = OffsetDateTime::now_utc();
        let code = sample(issued);

        assert!(!code.is_expired_at(issued + Duration::minutes(9)));
        assert!(code.is_expired_at(issued + Duration::minutes(10)));
        assert!(code.is_expired_at(issued + Duration::minutes(11)));
        assert_eq!(code.lifetime(), Duration::minutes(10));
    }

    #[test]
    fn test_generated_codes_unique() {
        let codes: std::collections::HashSet<String> =
            (0..100).map(|_| AuthorizationCode::generate_code()).collect();
        assert_eq!(codes.len(), 100);
    }
}
