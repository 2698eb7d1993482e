//! Issued token records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// An access/refresh token pair plus its metadata.
///
/// Only digests of the token values are stored. The record stays resolvable
/// by access token until `access_expires_at` and by refresh token until
/// `refresh_expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Record id (also the access token `jti`).
    pub id: Uuid,

    /// Digest of the access token.
    pub access_token_hash: String,

    /// Digest of the refresh token, if one was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_hash: Option<String>,

    /// Client the tokens were issued to.
    pub client_id: String,

    /// End user the tokens represent.
    pub user_id: String,

    /// Granted scope (space-delimited).
    pub scope: String,

    /// Authorization code this pair was minted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code_id: Option<Uuid>,

    /// When the end user authenticated (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Access token expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,

    /// Refresh token expiry.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub refresh_expires_at: Option<OffsetDateTime>,
}

impl TokenRecord {
    /// Returns `true` if the access token is past its expiry.
    #[must_use]
    pub fn is_access_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.access_expires_at
    }

    /// Returns `true` if there is no refresh token or it is past its expiry.
    #[must_use]
    pub fn is_refresh_expired_at(&self, now: OffsetDateTime) -> bool {
        self.refresh_expires_at.is_none_or(|exp| now >= exp)
    }

    /// Returns `true` once neither half of the pair is usable.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.is_access_expired_at(now) && self.is_refresh_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_expiry_halves() {
        let now = OffsetDateTime::now_utc();
        let record = TokenRecord {
            id: Uuid::new_v4(),
            access_token_hash: "a".to_string(),
            refresh_token_hash: Some("r".to_string()),
            client_id: "app".to_string(),
            user_id: "alice".to_string(),
            scope: "openid".to_string(),
            authorization_code_id: None,
            auth_time: None,
            issued_at: now,
            access_expires_at: now + Duration::hours(1),
            refresh_expires_at: Some(now + Duration::days(30)),
        };

        let later = now + Duration::hours(2);
        assert!(record.is_access_expired_at(later));
        assert!(!record.is_refresh_expired_at(later));
        assert!(!record.is_expired_at(later));
        assert!(record.is_expired_at(now + Duration::days(31)));
    }

    #[test]
    fn test_missing_refresh_counts_as_expired() {
        let now = OffsetDateTime::now_utc();
        let record = TokenRecord {
            id: Uuid::new_v4(),
            access_token_hash: "a".to_string(),
            refresh_token_hash: None,
            client_id: "app".to_string(),
            user_id: "alice".to_string(),
            scope: "openid".to_string(),
            authorization_code_id: None,
            auth_time: None,
            issued_at: now,
            access_expires_at: now + Duration::hours(1),
            refresh_expires_at: None,
        };
        assert!(record.is_refresh_expired_at(now));
        assert!(!record.is_expired_at(now));
    }
}
