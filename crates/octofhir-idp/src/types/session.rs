//! Authorization sessions and browser sessions.
//!
//! An [`AuthSession`] lives only while one authorization request waits for
//! login or consent. A [`UserSession`] represents an authenticated browser and
//! outlives any single request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::crypto::PkceMethod;
use crate::types::ResponseType;

// =============================================================================
// Prompt
// =============================================================================

/// Values of the OIDC `prompt` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    /// Do not display any UI.
    None,
    /// Force re-authentication.
    Login,
    /// Force the consent screen.
    Consent,
    /// Account selection (treated like `login`).
    SelectAccount,
}

impl Prompt {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Login => "login",
            Self::Consent => "consent",
            Self::SelectAccount => "select_account",
        }
    }

    /// Parses a space-delimited `prompt` value.
    ///
    /// # Errors
    ///
    /// Returns the offending value if it is unknown or if `none` is combined
    /// with another value.
    pub fn parse_list(value: &str) -> Result<Vec<Self>, String> {
        let prompts = value
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<Self>, _>>()?;

        if prompts.contains(&Self::None) && prompts.len() > 1 {
            return Err(value.to_string());
        }

        Ok(prompts)
    }
}

impl FromStr for Prompt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "login" => Ok(Self::Login),
            "consent" => Ok(Self::Consent),
            "select_account" => Ok(Self::SelectAccount),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Auth Session
// =============================================================================

/// Outcome of the consent step for an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentDecision {
    /// Not decided yet.
    #[default]
    Pending,
    /// End user approved.
    Granted,
    /// End user refused.
    Denied,
}

/// An authorization request waiting for login and/or consent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Session id, carried between `/authorize`, `/login` and `/consent`.
    pub id: Uuid,

    /// Requesting client.
    pub client_id: String,

    /// Validated redirect URI.
    pub redirect_uri: String,

    /// Requested response type.
    pub response_type: ResponseType,

    /// Requested scope (space-delimited).
    pub scope: String,

    /// Opaque client state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Replay-protection nonce for the ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// PKCE code challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<PkceMethod>,

    /// Requested prompt values.
    #[serde(default)]
    pub prompt: Vec<Prompt>,

    /// Maximum authentication age in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,

    /// Requested ACR values (space-delimited).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr_values: Option<String>,

    /// Authenticated end user, once login succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Browser session that authenticated this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_session_id: Option<Uuid>,

    /// Consent outcome.
    #[serde(default)]
    pub consent: ConsentDecision,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the session expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthSession {
    /// Returns `true` if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Returns `true` once login has completed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Returns `true` if the request carried the given prompt value.
    #[must_use]
    pub fn has_prompt(&self, prompt: Prompt) -> bool {
        self.prompt.contains(&prompt)
    }

    /// Requested scopes as a list.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }
}

// =============================================================================
// User Session
// =============================================================================

/// An authenticated browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// Session id, stored in the session cookie.
    pub id: Uuid,

    /// Authenticated end user.
    pub user_id: String,

    /// When the end user authenticated.
    #[serde(with = "time::serde::rfc3339")]
    pub auth_time: OffsetDateTime,

    /// How the end user authenticated (e.g. `password`).
    pub auth_method: String,

    /// Authentication context class reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authentication method references.
    #[serde(default)]
    pub amr: Vec<String>,

    /// Last request seen on this session.
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,

    /// Absolute expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl UserSession {
    /// Creates a session for a user who just authenticated.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        auth_method: impl Into<String>,
        amr: Vec<String>,
        acr: Option<String>,
        lifetime: Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            auth_time: now,
            auth_method: auth_method.into(),
            acr,
            amr,
            last_activity: now,
            expires_at: now + lifetime,
        }
    }

    /// Returns `true` if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Checks whether authentication is recent enough for `max_age`.
    ///
    /// Fresh iff `now - auth_time <= max_age`. A `max_age` of zero (or less)
    /// is never fresh.
    #[must_use]
    pub fn is_auth_time_fresh(&self, max_age: Duration) -> bool {
        self.is_auth_time_fresh_at(max_age, OffsetDateTime::now_utc())
    }

    /// [`Self::is_auth_time_fresh`] against an explicit instant.
    #[must_use]
    pub fn is_auth_time_fresh_at(&self, max_age: Duration, now: OffsetDateTime) -> bool {
        if max_age <= Duration::ZERO {
            return false;
        }
        now - self.auth_time <= max_age
    }

    /// `auth_time` as unix seconds, for ID token claims.
    #[must_use]
    pub fn auth_time_unix(&self) -> i64 {
        self.auth_time.unix_timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_authenticated_at(auth_time: OffsetDateTime) -> UserSession {
        let mut session = UserSession::new(
            "alice",
            "password",
            vec!["pwd".to_string()],
            None,
            Duration::hours(24),
        );
        session.auth_time = auth_time;
        session
    }

    #[test]
    fn test_auth_time_freshness() {
        let now = OffsetDateTime::now_utc();
        let session = session_authenticated_at(now - Duration::seconds(120));

        assert!(session.is_auth_time_fresh_at(Duration::seconds(300), now));
        assert!(session.is_auth_time_fresh_at(Duration::seconds(120), now));
        assert!(!session.is_auth_time_fresh_at(Duration::seconds(119), now));
    }

    #[test]
    fn test_zero_max_age_is_never_fresh() {
        let now = OffsetDateTime::now_utc();
        let session = session_authenticated_at(now);

        assert!(!session.is_auth_time_fresh_at(Duration::ZERO, now));
        assert!(!session.is_auth_time_fresh(Duration::ZERO));
        assert!(!session.is_auth_time_fresh_at(Duration::seconds(-5), now));
    }

    #[test]
    fn test_prompt_parsing() {
        assert_eq!(
            Prompt::parse_list("login consent").unwrap(),
            vec![Prompt::Login, Prompt::Consent]
        );
        assert_eq!(Prompt::parse_list("none").unwrap(), vec![Prompt::None]);
        assert!(Prompt::parse_list("none login").is_err());
        assert!(Prompt::parse_list("bogus").is_err());
        assert!(Prompt::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_user_session_expiry() {
        let mut session = session_authenticated_at(OffsetDateTime::now_utc());
        assert!(!session.is_expired());
        session.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        assert!(session.is_expired());
    }
}
