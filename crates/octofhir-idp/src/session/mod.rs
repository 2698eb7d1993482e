//! Session and consent tracking.
//!
//! Bridges browser authentication to protocol state:
//!
//! - [`AuthSession`]: one in-flight authorization request, keyed by the
//!   `session_id` carried between `/authorize`, `/login`, and `/consent`
//! - [`UserSession`]: an authenticated browser, keyed by the session cookie
//! - [`Consent`]: scopes a user approved for a client

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::{OAuthConfig, to_time_duration};
use crate::crypto::password::{dummy_verify, verify_password};
use crate::error::AuthError;
use crate::storage::{
    AuthSessionStorage, ConsentStorage, IdpStores, UserSessionStorage, UserStorage,
};
use crate::types::{AuthSession, Consent, User, UserSession};

/// Authentication method recorded for password logins.
pub const PASSWORD_AUTH_METHOD: &str = "password";

/// Session and consent tracker.
pub struct SessionService {
    auth_sessions: Arc<dyn AuthSessionStorage>,
    user_sessions: Arc<dyn UserSessionStorage>,
    consents: Arc<dyn ConsentStorage>,
    users: Arc<dyn UserStorage>,
    config: OAuthConfig,
}

impl SessionService {
    /// Creates a session service.
    #[must_use]
    pub fn new(stores: &IdpStores, config: OAuthConfig) -> Self {
        Self {
            auth_sessions: stores.auth_sessions.clone(),
            user_sessions: stores.user_sessions.clone(),
            consents: stores.consents.clone(),
            users: stores.users.clone(),
            config,
        }
    }

    // =========================================================================
    // Authorization Sessions
    // =========================================================================

    /// Expiry for an authorization session created now.
    #[must_use]
    pub fn auth_session_expiry(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + to_time_duration(self.config.auth_session_lifetime)
    }

    /// Persists a new authorization session.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn create_auth_session(&self, session: &AuthSession) -> AuthResult<()> {
        self.auth_sessions.create(session).await?;
        tracing::debug!(
            session_id = %session.id,
            client_id = %session.client_id,
            "Authorization session started"
        );
        Ok(())
    }

    /// Loads an authorization session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the session is unknown, finished, or expired.
    pub async fn auth_session(&self, id: Uuid) -> AuthResult<AuthSession> {
        self.auth_sessions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::invalid_request("Unknown or expired authorization session"))
    }

    /// Saves changes to an authorization session.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn update_auth_session(&self, session: &AuthSession) -> AuthResult<()> {
        self.auth_sessions.update(session).await
    }

    /// Ends an authorization session once its flow has terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn end_auth_session(&self, id: Uuid) -> AuthResult<()> {
        self.auth_sessions.delete(id).await?;
        tracing::debug!(session_id = %id, "Authorization session finished");
        Ok(())
    }

    // =========================================================================
    // User Sessions
    // =========================================================================

    /// Resolves the browser session named by the session cookie, if still valid.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn user_session(&self, id: Option<Uuid>) -> AuthResult<Option<UserSession>> {
        match id {
            Some(id) => self.user_sessions.find_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Records activity on a browser session.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn touch(&self, session: &mut UserSession) -> AuthResult<()> {
        session.last_activity = OffsetDateTime::now_utc();
        self.user_sessions.update(session).await
    }

    /// Verifies a username and password.
    ///
    /// Unknown usernames still run a full password hash verification so the
    /// response time does not reveal whether the account exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails. Bad credentials are `Ok(None)`.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<Option<User>> {
        let Some(user) = self.users.find_by_username(username).await? else {
            dummy_verify(password);
            tracing::warn!("Login failed");
            return Ok(None);
        };

        if verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            tracing::warn!(user_id = %user.id, "Login failed");
            Ok(None)
        }
    }

    /// Starts a browser session for a freshly authenticated user.
    ///
    /// A previous session presented by the same browser is replaced, so a
    /// session id is never reused across logins.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn start_user_session(
        &self,
        user: &User,
        previous: Option<Uuid>,
    ) -> AuthResult<UserSession> {
        if let Some(previous) = previous {
            self.user_sessions.delete(previous).await?;
        }

        let session = UserSession::new(
            user.id.clone(),
            PASSWORD_AUTH_METHOD,
            vec!["pwd".to_string()],
            None,
            to_time_duration(self.config.user_session_lifetime),
        );
        self.user_sessions.create(&session).await?;

        tracing::info!(user_id = %user.id, session_id = %session.id, "User session started");
        Ok(session)
    }

    /// Loads a user by subject id.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the user no longer exists.
    pub async fn user(&self, user_id: &str) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::access_denied("The authenticated user no longer exists"))
    }

    // =========================================================================
    // Consent
    // =========================================================================

    /// Returns `true` if stored consent covers every requested scope.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn consent_covers(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: &[&str],
    ) -> AuthResult<bool> {
        Ok(self
            .consents
            .find(user_id, client_id)
            .await?
            .is_some_and(|consent| consent.covers(scopes)))
    }

    /// Records approval of `scopes`, merging with any earlier consent.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn grant_consent(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: &[&str],
    ) -> AuthResult<Consent> {
        let consent = match self.consents.find(user_id, client_id).await? {
            Some(mut existing) => {
                existing.extend(scopes);
                existing
            }
            None => Consent::new(user_id, client_id, scopes),
        };

        self.consents.save(&consent).await?;
        tracing::info!(
            user_id = %user_id,
            client_id = %client_id,
            scopes = %consent.scopes.join(" "),
            "Consent granted"
        );
        Ok(consent)
    }
}
