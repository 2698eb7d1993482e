//! Session storage traits.
//!
//! [`AuthSessionStorage`] holds in-flight authorization requests;
//! [`UserSessionStorage`] holds authenticated browser sessions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{AuthSession, UserSession};

/// Storage trait for in-flight authorization requests.
#[async_trait]
pub trait AuthSessionStorage: Send + Sync {
    /// Stores a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn create(&self, session: &AuthSession) -> AuthResult<()>;

    /// Finds a session by id. Expired sessions are reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<AuthSession>>;

    /// Replaces a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist or the write fails.
    async fn update(&self, session: &AuthSession) -> AuthResult<()>;

    /// Deletes a session. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: Uuid) -> AuthResult<bool>;

    /// Removes expired sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}

/// Storage trait for authenticated browser sessions.
#[async_trait]
pub trait UserSessionStorage: Send + Sync {
    /// Stores a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn create(&self, session: &UserSession) -> AuthResult<()>;

    /// Finds a session by id. Expired sessions are reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<UserSession>>;

    /// Returns the unexpired session with the latest `auth_time` for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_latest_for_user(&self, user_id: &str) -> AuthResult<Option<UserSession>>;

    /// Replaces a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist or the write fails.
    async fn update(&self, session: &UserSession) -> AuthResult<()>;

    /// Deletes a session. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: Uuid) -> AuthResult<bool>;

    /// Removes expired sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
